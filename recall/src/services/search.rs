//! Search Planner (§4.5). Generalizes the teacher's `tokio::join!` dual-fetch
//! hybrid-fusion shape (`search_hybrid`) from a documents+memories split into
//! the spec's five-mode planner (keyword/semantic/hybrid/entity/nlp) over a
//! single Memory aggregate, plus the UUID short-circuit and NLP lexical
//! pre-parse the teacher never had.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::db::DatabaseBackend;
use crate::embeddings::EmbeddingProvider;
use crate::error::{CoreError, Result};
use crate::models::{
    search_type, Entity, Memory, RequestContext, SearchFilters, SearchMode, SearchPagination,
    SearchRequest, SearchResponse, SearchResultItem,
};
use crate::search::{keyword, nlp};
use crate::services::memory::check_visibility;

#[derive(Clone)]
pub struct SearchService {
    db: Arc<dyn DatabaseBackend>,
    embeddings: Option<EmbeddingProvider>,
    config: Arc<Config>,
}

/// Candidate-pool size for modes that rank in Rust over a bounded fetch
/// (keyword/hybrid/entity): big enough to cover `offset + limit` after
/// filtering, without requiring a true count query. Same tradeoff the
/// teacher's own `limit.saturating_mul(3)` hybrid fetch already accepted.
fn candidate_pool(request: &SearchRequest) -> u32 {
    request.offset.saturating_add(request.limit).saturating_mul(3).clamp(10, 500)
}

impl SearchService {
    pub fn new(db: Arc<dyn DatabaseBackend>, embeddings: Option<EmbeddingProvider>, config: Arc<Config>) -> Self {
        Self { db, embeddings, config }
    }

    /// Entry point: UUID short-circuit first, then mode dispatch (§4.5).
    #[tracing::instrument(skip(self, ctx, request))]
    pub async fn search(&self, ctx: &RequestContext, request: SearchRequest) -> Result<SearchResponse> {
        let request = request.normalize();

        if Uuid::parse_str(&request.query).is_ok() {
            return self.direct_fetch(ctx, &request).await;
        }

        match request.mode {
            SearchMode::Keyword => self.search_keyword(ctx, &request).await,
            SearchMode::Semantic => self.search_semantic(ctx, &request).await,
            SearchMode::Hybrid => self.search_hybrid(ctx, &request).await,
            SearchMode::Entity => self.search_entity(ctx, &request, &request.query).await,
            SearchMode::Nlp => self.search_nlp(ctx, &request).await,
        }
    }

    async fn direct_fetch(&self, ctx: &RequestContext, request: &SearchRequest) -> Result<SearchResponse> {
        let memory = self.db.get_memory_by_id(&ctx.tenant_id, &request.query).await?;
        let results = match memory {
            Some(memory) if check_visibility(ctx, &memory).is_ok() => {
                vec![self.to_result_item(&memory, 1.0).await?]
            }
            _ => Vec::new(),
        };

        Ok(SearchResponse {
            query: request.query.clone(),
            search_type: search_type::DIRECT_DB_QUERY.to_string(),
            count: results.len(),
            total: Some(results.len() as u64),
            results,
            pagination: SearchPagination { limit: request.limit, offset: request.offset, has_more: false },
        })
    }

    async fn search_keyword(&self, ctx: &RequestContext, request: &SearchRequest) -> Result<SearchResponse> {
        let candidates = self.db.fetch_keyword_candidates(&ctx.tenant_id, candidate_pool(request)).await?;
        let ranked = keyword::rank(candidates, &request.query);
        self.finalize(ctx, request, search_type::KEYWORD, ranked).await
    }

    async fn search_semantic(&self, ctx: &RequestContext, request: &SearchRequest) -> Result<SearchResponse> {
        let Some(embeddings) = &self.embeddings else {
            return Err(CoreError::Invalid("semantic search requires an Embedder to be configured".to_string()));
        };
        let query_vector = embeddings.embed_query(&request.query).await?;
        let hits = self
            .db
            .search_similar_memories(
                &ctx.tenant_id,
                &query_vector,
                candidate_pool(request),
                self.config.search.semantic_similarity_threshold,
            )
            .await?;
        self.finalize(ctx, request, search_type::SEMANTIC, hits).await
    }

    /// §4.5 hybrid fusion: `score = w_k·keyword + w_s·semantic`, missing side
    /// contributes 0. Falls back to pure keyword, tagged `hybrid-keyword`,
    /// when semantic returns nothing (no Embedder, or nothing clears the
    /// similarity threshold).
    async fn search_hybrid(&self, ctx: &RequestContext, request: &SearchRequest) -> Result<SearchResponse> {
        let pool = candidate_pool(request);
        let candidates = self.db.fetch_keyword_candidates(&ctx.tenant_id, pool).await?;
        let keyword_hits = keyword::rank(candidates, &request.query);

        let semantic_hits = match &self.embeddings {
            Some(embeddings) => {
                let query_vector = embeddings.embed_query(&request.query).await?;
                self.db
                    .search_similar_memories(
                        &ctx.tenant_id,
                        &query_vector,
                        pool,
                        self.config.search.semantic_similarity_threshold,
                    )
                    .await?
            }
            None => Vec::new(),
        };

        if semantic_hits.is_empty() {
            return self.finalize(ctx, request, search_type::HYBRID_KEYWORD, keyword_hits).await;
        }

        let weight_keyword = self.config.search.hybrid_keyword_weight;
        let weight_semantic = self.config.search.hybrid_semantic_weight;
        if (weight_keyword + weight_semantic - 1.0).abs() > 0.01 {
            return Err(CoreError::Invalid(format!(
                "hybrid search weights must sum to 1.0 (+/- 0.01); got {weight_keyword} + {weight_semantic}"
            )));
        }

        let mut combined: HashMap<String, (Memory, f32)> = HashMap::new();
        for (memory, score) in keyword_hits {
            combined.insert(memory.id.clone(), (memory, weight_keyword * score));
        }
        for (memory, score) in semantic_hits {
            combined
                .entry(memory.id.clone())
                .and_modify(|(_, existing)| *existing += weight_semantic * score)
                .or_insert_with(|| (memory, weight_semantic * score));
        }

        let mut scored: Vec<(Memory, f32)> = combined.into_values().collect();
        sort_by_score_desc(&mut scored);

        self.finalize(ctx, request, search_type::HYBRID, scored).await
    }

    /// §4.5 entity mode: resolve `name` to an Entity by case-insensitive
    /// name/alias, then list memories joined through the association table.
    async fn search_entity(&self, ctx: &RequestContext, request: &SearchRequest, name: &str) -> Result<SearchResponse> {
        let Some(entity) = self.db.find_entity_by_name_or_alias(&Entity::lookup_key(name)).await? else {
            return Ok(SearchResponse {
                query: request.query.clone(),
                search_type: search_type::ENTITY.to_string(),
                count: 0,
                total: Some(0),
                results: Vec::new(),
                pagination: SearchPagination { limit: request.limit, offset: request.offset, has_more: false },
            });
        };

        let hits = self
            .db
            .get_memories_for_entity(&ctx.tenant_id, &entity.id, candidate_pool(request), 0)
            .await?;
        self.finalize(ctx, request, search_type::ENTITY, hits).await
    }

    /// §4.5 NLP mode: lexical pre-parse, merge extracted filters into the
    /// request, then dispatch to entity (if a person-like hint was found) or
    /// semantic/keyword for the residual query.
    async fn search_nlp(&self, ctx: &RequestContext, request: &SearchRequest) -> Result<SearchResponse> {
        let extraction = nlp::extract(&request.query, chrono::Utc::now());

        let mut filters = request.filters.clone();
        filters.tags.extend(extraction.tags.clone());
        filters.date_from = filters.date_from.or(extraction.date_from);
        filters.date_to = filters.date_to.or(extraction.date_to);

        let residual_query = if extraction.residual_query.trim().is_empty() {
            request.query.clone()
        } else {
            extraction.residual_query.clone()
        };

        let mut inner_request = request.clone();
        inner_request.filters = filters;
        inner_request.query = residual_query;

        let mut response = if let Some(entity_hint) = extraction.entity_hint.as_deref() {
            self.search_entity(ctx, &inner_request, entity_hint).await?
        } else if self.embeddings.is_some() {
            self.search_semantic(ctx, &inner_request).await?
        } else {
            self.search_keyword(ctx, &inner_request).await?
        };

        response.search_type = search_type::NLP.to_string();
        response.query = request.query.clone();
        Ok(response)
    }

    /// Applies the visibility predicate and the request's explicit filters,
    /// paginates, and converts survivors into the §4.5 wire shape.
    async fn finalize(
        &self,
        ctx: &RequestContext,
        request: &SearchRequest,
        search_type: &str,
        scored: Vec<(Memory, f32)>,
    ) -> Result<SearchResponse> {
        let filtered: Vec<(Memory, f32)> = scored
            .into_iter()
            .filter(|(memory, _)| passes_filters(ctx, memory, &request.filters))
            .collect();

        let total = filtered.len() as u64;
        let page: Vec<(Memory, f32)> = filtered
            .into_iter()
            .skip(request.offset as usize)
            .take(request.limit as usize)
            .collect();
        let has_more = u64::from(request.offset) + page.len() as u64 < total;

        let mut results = Vec::with_capacity(page.len());
        for (memory, score) in page {
            results.push(self.to_result_item(&memory, score).await?);
        }

        Ok(SearchResponse {
            query: request.query.clone(),
            search_type: search_type.to_string(),
            count: results.len(),
            total: Some(total),
            results,
            pagination: SearchPagination { limit: request.limit, offset: request.offset, has_more },
        })
    }

    async fn to_result_item(&self, memory: &Memory, score: f32) -> Result<SearchResultItem> {
        let has_correction = self.db.get_latest_correction(&memory.id).await?.is_some();
        Ok(SearchResultItem {
            id: memory.id.clone(),
            title: memory.title.clone(),
            content: memory.content.clone(),
            content_truncated: None,
            content_length: None,
            tags: memory.tags.iter().cloned().collect(),
            created_at: memory.created_at,
            score,
            visibility: memory.visibility,
            created_by: memory.created_by.clone(),
            has_correction,
        }
        .with_preview())
    }
}

fn sort_by_score_desc(scored: &mut [(Memory, f32)]) {
    scored.sort_by(|(a, a_score), (b, b_score)| {
        b_score
            .partial_cmp(a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

fn passes_filters(ctx: &RequestContext, memory: &Memory, filters: &SearchFilters) -> bool {
    if check_visibility(ctx, memory).is_err() {
        return false;
    }
    if !filters.tags.is_empty() && !filters.tags.iter().any(|tag| memory.tags.contains(tag)) {
        return false;
    }
    if filters.date_from.is_some_and(|from| memory.created_at < from) {
        return false;
    }
    if filters.date_to.is_some_and(|to| memory.created_at > to) {
        return false;
    }
    if !filters.visibility.is_empty() && !filters.visibility.contains(&memory.visibility) {
        return false;
    }
    if let Some(ref user) = filters.user {
        if memory.created_by.as_deref() != Some(user.as_str()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::config::{Config, DatabaseConfig};
    use crate::db::{Database, LibSqlBackend};
    use crate::models::{CreateMemoryRequest, Visibility};
    use crate::services::memory::{CreateOptions, CreateOutcome, MemoryService};

    fn test_db_config() -> DatabaseConfig {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let thread_id = std::thread::current().id();
        DatabaseConfig {
            url: format!("file:/tmp/recall_search_test_{thread_id:?}_{timestamp}?mode=memory&cache=shared"),
            auth_token: None,
            local_path: None,
            busy_timeout_ms: 5000,
            journal_mode: "WAL".into(),
            synchronous: "NORMAL".into(),
            pool_min: 1,
            pool_max: 4,
            acquire_retries: 3,
        }
    }

    async fn test_backend() -> Arc<dyn DatabaseBackend> {
        let db = Database::new(&test_db_config()).await.expect("db init");
        Arc::new(LibSqlBackend::new(db))
    }

    fn ctx() -> RequestContext {
        RequestContext { tenant_id: "t1".into(), user_id: Some("u1".into()), permissions: Vec::new() }
    }

    fn request(query: &str, mode: SearchMode) -> SearchRequest {
        SearchRequest { query: query.to_string(), mode, filters: SearchFilters::default(), limit: 10, offset: 0 }
            .normalize()
    }

    async fn seed_memory(backend: &Arc<dyn DatabaseBackend>, config: &Arc<Config>, content: &str) -> Memory {
        use crate::attachments::storage::LocalStorageBackend;
        use crate::attachments::AttachmentService;
        use crate::cache::Cache;
        use crate::config::{AttachmentsConfig, CacheConfig, QueueConfig};
        use crate::events::EventBus;
        use crate::models::{Tenant, TenantSettings};
        use crate::queue::TaskQueue;

        if backend.get_tenant_by_id("t1").await.unwrap().is_none() {
            let tenant = Tenant::new(
                "t1".into(),
                "acme".into(),
                "free".into(),
                TenantSettings { max_memories: Some(1000), max_file_size_bytes: 1024 * 1024 },
            );
            backend.create_tenant(&tenant).await.unwrap();
        }

        let cache = Arc::new(Cache::new(CacheConfig {
            enabled: true,
            key_prefix: "recall-test".into(),
            capacity: 100,
            embedding_ttl_secs: 60,
            entity_graph_ttl_secs: 60,
            memory_ttl_secs: 60,
            metadata_ttl_secs: 60,
            search_result_ttl_secs: 60,
            list_ttl_secs: 60,
        }));
        let storage: Arc<dyn crate::attachments::storage::StorageBackend> =
            Arc::new(LocalStorageBackend::new("/tmp/recall_search_test_attachments".into()));
        let attachments = AttachmentService::new(
            backend.clone(),
            storage,
            None,
            None,
            AttachmentsConfig { storage_root: "/tmp/recall_search_test_attachments".into(), max_file_size_bytes: 1024 * 1024, download_timeout_secs: 5 },
        );
        let (queue, _rx) = TaskQueue::new(QueueConfig { workers: 1, max_attempts: 1, shutdown_drain_secs: 1 });

        let service = MemoryService::new(backend.clone(), cache, None, None, attachments, Arc::new(queue), EventBus::new(), config.clone());
        let request = CreateMemoryRequest { content: content.to_string(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), force: true, run_async: false, ..Default::default() };
        let CreateOutcome::Created(memory) = service.create("t1", request, options).await.expect("seed create") else {
            panic!("expected Created")
        };
        memory
    }

    fn test_config() -> Arc<Config> {
        let mut config = Config::from_env();
        config.search.semantic_similarity_threshold = 0.0;
        config.search.hybrid_keyword_weight = 0.5;
        config.search.hybrid_semantic_weight = 0.5;
        config.search.max_limit = 100;
        Arc::new(config)
    }

    #[tokio::test]
    async fn keyword_search_ranks_by_trigram_similarity() {
        let backend = test_backend().await;
        let config = test_config();
        seed_memory(&backend, &config, "Ship the release today").await;
        seed_memory(&backend, &config, "completely unrelated gardening notes").await;

        let service = SearchService::new(backend, None, config);
        let response = service.search(&ctx(), request("Ship the release today", SearchMode::Keyword)).await.unwrap();

        assert_eq!(response.search_type, search_type::KEYWORD);
        assert_eq!(response.results.len(), 1);
        assert!(response.results[0].content.contains("Ship the release"));
    }

    #[tokio::test]
    async fn direct_fetch_short_circuits_on_uuid_query() {
        let backend = test_backend().await;
        let config = test_config();
        let memory = seed_memory(&backend, &config, "Lookup me directly").await;

        let service = SearchService::new(backend, None, config);
        let response = service.search(&ctx(), request(&memory.id, SearchMode::Keyword)).await.unwrap();

        assert_eq!(response.search_type, search_type::DIRECT_DB_QUERY);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].id, memory.id);
    }

    #[tokio::test]
    async fn private_memory_from_another_user_is_excluded() {
        let backend = test_backend().await;
        let config = test_config();
        seed_memory(&backend, &config, "Ship the release today").await;

        let other_ctx = RequestContext { tenant_id: "t1".into(), user_id: Some("someone-else".into()), permissions: Vec::new() };
        let service = SearchService::new(backend, None, config);
        let response = service.search(&other_ctx, request("Ship the release today", SearchMode::Keyword)).await.unwrap();

        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn hybrid_falls_back_to_keyword_when_no_embedder_configured() {
        let backend = test_backend().await;
        let config = test_config();
        seed_memory(&backend, &config, "Ship the release today").await;

        let service = SearchService::new(backend, None, config);
        let response = service.search(&ctx(), request("Ship the release today", SearchMode::Hybrid)).await.unwrap();

        assert_eq!(response.search_type, search_type::HYBRID_KEYWORD);
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn nlp_mode_extracts_tags_and_reports_nlp_search_type() {
        let backend = test_backend().await;
        let config = test_config();
        let mut memory = seed_memory(&backend, &config, "Ship the release today").await;
        memory.tags.insert("release".to_string());
        backend.update_memory(&memory).await.unwrap();

        let service = SearchService::new(backend, None, config);
        let response = service.search(&ctx(), request("ship the release #release", SearchMode::Nlp)).await.unwrap();

        assert_eq!(response.search_type, search_type::NLP);
    }

    #[test]
    fn filters_reject_rows_outside_the_date_window() {
        let mut memory = Memory::new("m1".into(), "t1".into(), Some("u1".into()), "content".into());
        memory.visibility = Visibility::Public;
        memory.created_at = chrono::Utc::now() - chrono::Duration::days(30);

        let filters = SearchFilters {
            date_from: Some(chrono::Utc::now() - chrono::Duration::days(1)),
            ..Default::default()
        };

        assert!(!passes_filters(&ctx(), &memory, &filters));
    }
}
