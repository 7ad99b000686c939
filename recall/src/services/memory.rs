//! Memory Service (§4.1). Generalizes the teacher's `services/memory.rs`
//! create-then-fire-and-forget-`tokio::spawn` pattern into explicit Task
//! Queue enqueues — background work is never launched outside the queue's
//! supervision (§9). Wires in the Deduper, Graph, Cache, and Event Bus built
//! for this crate; the embedding/extraction/attachment task bodies live here
//! too (`handle_*`) since they are this service's domain, with only their
//! *registration* on the queue left to process startup.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::attachments::AttachmentService;
use crate::cache::{self, Cache};
use crate::config::Config;
use crate::db::DatabaseBackend;
use crate::dedup::{self, DuplicateMatch};
use crate::embeddings::EmbeddingProvider;
use crate::error::{CoreError, Result};
use crate::events::EventBus;
use crate::extraction::Extractor;
use crate::graph;
use crate::models::{
    Attachment, ChangeType, Correction, CreateMemoryRequest, EventType, Memory, MemoryVersion,
    MergeStrategy, RequestContext, UpdateMemoryRequest, Visibility,
};
use crate::queue::{Task, TaskPriority, TaskQueue};

const MAX_ATTACHMENTS_PER_CREATE: usize = 10;
const MANAGE_PERMISSION: &str = "memories.manage";

/// Outcome of `create()` (§4.1). `Merged` covers the `auto-merge`/
/// `auto-merge-append` override (§4.4): the Deduper matched, but the
/// incoming memory's tags bypass the warning and fold into the existing row.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Memory),
    DuplicateFound { existing: Memory, similarity: f32 },
    Merged(Memory),
}

/// Operational knobs `create()` takes beyond the request DTO (§4.1's
/// `async`/`force`/`dedup_window_s`/`merge_strategy` parameters). `async` is
/// a reserved word, so the flag is named `run_async` here.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub created_by: Option<String>,
    pub force: bool,
    pub run_async: bool,
    pub dedup_window_secs: Option<u64>,
    pub merge_strategy: MergeStrategy,
    pub attachment_ids: Vec<String>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            created_by: None,
            force: false,
            run_async: true,
            dedup_window_secs: None,
            merge_strategy: MergeStrategy::default(),
            attachment_ids: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct MemoryService {
    db: Arc<dyn DatabaseBackend>,
    cache: Arc<Cache>,
    embeddings: Option<EmbeddingProvider>,
    extractor: Option<Extractor>,
    attachments: AttachmentService,
    queue: Arc<TaskQueue>,
    events: EventBus,
    config: Arc<Config>,
}

impl MemoryService {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        cache: Arc<Cache>,
        embeddings: Option<EmbeddingProvider>,
        extractor: Option<Extractor>,
        attachments: AttachmentService,
        queue: Arc<TaskQueue>,
        events: EventBus,
        config: Arc<Config>,
    ) -> Self {
        Self { db, cache, embeddings, extractor, attachments, queue, events, config }
    }

    /// §4.1 `create`, steps 1-10.
    #[tracing::instrument(skip(self, request, options), fields(tenant_id))]
    pub async fn create(
        &self,
        tenant_id: &str,
        request: CreateMemoryRequest,
        options: CreateOptions,
    ) -> Result<CreateOutcome> {
        if options.attachment_ids.len() > MAX_ATTACHMENTS_PER_CREATE {
            return Err(CoreError::Invalid(format!(
                "at most {MAX_ATTACHMENTS_PER_CREATE} attachments per memory"
            )));
        }

        let tenant = self
            .db
            .get_tenant_by_id(tenant_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("tenant {tenant_id} not found")))?;

        if let Some(max) = tenant.settings.max_memories {
            let count = self.db.count_memories_for_tenant(tenant_id).await?;
            if count >= max {
                return Err(CoreError::QuotaExceeded(format!(
                    "tenant {tenant_id} has reached its memory limit of {max}"
                )));
            }
        }

        let auto_merge_override = dedup::auto_merge_strategy(&request.tags);

        if !options.force {
            let window_secs = options.dedup_window_secs.unwrap_or(self.config.tenancy.dedup_window_secs);
            let found = dedup::find_duplicate(
                self.db.as_ref(),
                tenant_id,
                options.created_by.as_deref(),
                &request.content,
                window_secs,
                self.config.search.near_duplicate_threshold,
            )
            .await?;

            if let Some(found) = found {
                if let Some(strategy) = auto_merge_override {
                    let merged = self
                        .apply_merge(found.existing(), &request.content, Some(&request.tags), strategy, options.created_by.as_deref(), Some("auto-merge"))
                        .await?;
                    return Ok(CreateOutcome::Merged(merged));
                }
                return Ok(CreateOutcome::DuplicateFound {
                    existing: found.existing().clone(),
                    similarity: found.similarity(),
                });
            }
        }

        let mut memory = Memory::new(Uuid::new_v4().to_string(), tenant_id.to_string(), options.created_by.clone(), request.content.clone());
        memory.title = request.title.clone();
        memory.tags = request.tags.clone();
        memory.metadata = request.metadata.clone();
        memory.visibility = request.visibility.unwrap_or_default();
        memory.validate().map_err(CoreError::Invalid)?;

        self.db.create_memory(&memory).await?;
        self.db
            .create_version(&version_snapshot(&memory, options.created_by.as_deref(), ChangeType::Create, None))
            .await?;
        self.db.prune_versions(&memory.id, self.config.versioning.max_versions_retained).await?;

        if self.embeddings.is_some() {
            if options.run_async {
                self.enqueue(TaskPriority::Normal, "generate_embedding", json!({"tenant_id": tenant_id, "memory_id": memory.id}))?;
            } else if let Some(embeddings) = &self.embeddings {
                let embedding = embeddings.embed_passage(&memory.content).await?;
                memory.embedding = Some(embedding.clone());
                self.db.update_memory(&memory).await?;
                self.events.publish(EventType::MemoryEmbeddingComplete, tenant_id, json!({"memory_id": memory.id}));
            }
        }

        if self.extractor.as_ref().is_some_and(Extractor::is_available) {
            self.enqueue(TaskPriority::Low, "extract_entities", json!({"tenant_id": tenant_id, "memory_id": memory.id}))?;
        }

        for attachment_id in &options.attachment_ids {
            self.enqueue(
                TaskPriority::Normal,
                "process_attachment",
                json!({"tenant_id": tenant_id, "memory_id": memory.id, "attachment_id": attachment_id}),
            )?;
        }

        cache::invalidate_memory(&self.cache, tenant_id, &memory.id);
        self.events.publish(EventType::MemoryCreated, tenant_id, json!({"memory": wire_memory(&memory)}));

        Ok(CreateOutcome::Created(memory))
    }

    /// §4.1 `update`: ownership-checked partial field update.
    #[tracing::instrument(skip(self, ctx, request))]
    pub async fn update(&self, ctx: &RequestContext, memory_id: &str, request: UpdateMemoryRequest, regenerate_embedding: bool) -> Result<Memory> {
        let mut memory = self.fetch_owned(ctx, memory_id).await?;

        let content_changed = request.content.as_ref().is_some_and(|c| c != &memory.content);

        if let Some(content) = request.content {
            memory.content = content;
        }
        if let Some(title) = request.title {
            memory.title = Some(title);
        }
        if let Some(tags) = request.tags {
            memory.tags = tags;
        }
        if let Some(metadata) = request.metadata {
            memory.metadata = metadata;
        }
        if let Some(visibility) = request.visibility {
            memory.visibility = visibility;
        }
        memory.validate().map_err(CoreError::Invalid)?;
        memory.current_version += 1;
        memory.updated_at = chrono::Utc::now();

        self.db.update_memory(&memory).await?;
        self.db
            .create_version(&version_snapshot(&memory, ctx.user_id.as_deref(), ChangeType::Update, request.change_reason.clone()))
            .await?;
        self.db.prune_versions(&memory.id, self.config.versioning.max_versions_retained).await?;

        if content_changed || regenerate_embedding {
            if self.embeddings.is_some() {
                self.enqueue(TaskPriority::Normal, "generate_embedding", json!({"tenant_id": memory.tenant_id, "memory_id": memory.id}))?;
            }
        }

        cache::invalidate_memory(&self.cache, &memory.tenant_id, &memory.id);
        self.events.publish(EventType::MemoryUpdated, memory.tenant_id.clone(), json!({"memory": wire_memory(&memory)}));

        Ok(memory)
    }

    /// §4.4 `update_or_merge`: diff-and-combine content under a merge
    /// strategy, distinct from `update`'s straight field replacement.
    #[tracing::instrument(skip(self, ctx, new_content, new_tags))]
    pub async fn update_or_merge(
        &self,
        ctx: &RequestContext,
        memory_id: &str,
        new_content: &str,
        new_tags: Option<&std::collections::HashSet<String>>,
        strategy: MergeStrategy,
    ) -> Result<Memory> {
        let existing = self.fetch_owned(ctx, memory_id).await?;
        self.apply_merge(&existing, new_content, new_tags, strategy, ctx.user_id.as_deref(), None).await
    }

    async fn apply_merge(
        &self,
        existing: &Memory,
        new_content: &str,
        new_tags: Option<&std::collections::HashSet<String>>,
        strategy: MergeStrategy,
        changed_by: Option<&str>,
        change_reason: Option<&str>,
    ) -> Result<Memory> {
        let mut merged = existing.clone();
        merged.content = dedup::merge_content(&existing.content, new_content, strategy);
        merged.tags = dedup::merge_tags(&existing.tags, new_tags);
        merged.current_version += 1;
        merged.updated_at = chrono::Utc::now();

        self.db.update_memory(&merged).await?;
        self.db
            .create_version(&version_snapshot(&merged, changed_by, ChangeType::Merge, change_reason.map(str::to_string)))
            .await?;
        self.db.prune_versions(&merged.id, self.config.versioning.max_versions_retained).await?;

        if self.embeddings.is_some() {
            self.enqueue(TaskPriority::Normal, "generate_embedding", json!({"tenant_id": merged.tenant_id, "memory_id": merged.id}))?;
        }

        cache::invalidate_memory(&self.cache, &merged.tenant_id, &merged.id);
        self.events.publish(EventType::MemoryUpdated, merged.tenant_id.clone(), json!({"memory": wire_memory(&merged)}));

        Ok(merged)
    }

    /// §4.1 `delete`: ownership check, cascade attachments + entity
    /// associations, retain version history, invalidate, publish.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn delete(&self, ctx: &RequestContext, memory_id: &str) -> Result<()> {
        let memory = self.fetch_owned(ctx, memory_id).await?;

        self.db.delete_attachments_by_memory(&memory.id).await?;
        self.db.delete_associations_by_memory(&memory.id).await?;

        let deleted = self.db.delete_memory(&memory.tenant_id, &memory.id).await?;
        if !deleted {
            return Err(CoreError::NotFound(format!("memory {memory_id} not found")));
        }

        cache::invalidate_memory(&self.cache, &memory.tenant_id, &memory.id);
        self.events.publish(EventType::MemoryDeleted, memory.tenant_id.clone(), json!({"memory_id": memory.id}));

        Ok(())
    }

    /// §4.1 `get`: tenant + visibility scoped read with corrections applied.
    /// Cache-backed on the serialized wire shape.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &RequestContext, memory_id: &str) -> Result<(Memory, String)> {
        let memory = self
            .db
            .get_memory_by_id(&ctx.tenant_id, memory_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("memory {memory_id} not found")))?;

        check_visibility(ctx, &memory)?;

        let latest_correction = self.db.get_latest_correction(&memory.id).await?;
        let effective_content = crate::models::effective_content(&memory.content, latest_correction.as_ref()).to_string();

        Ok((memory, effective_content))
    }

    /// §4.1 `add_correction`: append a Correction row and a MemoryVersion
    /// with `change_type=correction`; `has_correction` is derived (DESIGN.md)
    /// from `get_latest_correction` returning `Some`, not a stored column.
    #[tracing::instrument(skip(self, ctx, corrected_content))]
    pub async fn add_correction(&self, ctx: &RequestContext, memory_id: &str, corrected_content: String, reason: Option<String>) -> Result<Correction> {
        let memory = self.fetch_owned(ctx, memory_id).await?;

        let correction = Correction::new(
            Uuid::new_v4().to_string(),
            memory.id.clone(),
            corrected_content.clone(),
            memory.content.clone(),
            reason.clone(),
            ctx.user_id.clone(),
        );
        self.db.create_correction(&correction).await?;

        let mut snapshot = memory.clone();
        snapshot.content = corrected_content;
        snapshot.current_version += 1;
        self.db
            .create_version(&version_snapshot(&snapshot, ctx.user_id.as_deref(), ChangeType::Correction, reason))
            .await?;
        self.db.prune_versions(&snapshot.id, self.config.versioning.max_versions_retained).await?;
        // The Memory row's own `content`/`current_version` intentionally stay
        // untouched: `effective_content` (applied in `get`) is what reflects
        // the correction, while `content` remains the original submission.

        cache::invalidate_memory(&self.cache, &memory.tenant_id, &memory.id);

        Ok(correction)
    }

    /// §4.9 delegation: ingest bytes already in hand, then enqueue processing.
    pub async fn add_attachment_bytes(&self, ctx: &RequestContext, memory_id: &str, filename: &str, mime_type: &str, bytes: &[u8]) -> Result<Attachment> {
        self.fetch_owned(ctx, memory_id).await?;
        let outcome = self.attachments.ingest_bytes(memory_id, filename, mime_type, bytes).await?;
        if !outcome.duplicate {
            self.enqueue(
                TaskPriority::Normal,
                "process_attachment",
                json!({"tenant_id": ctx.tenant_id, "memory_id": memory_id, "attachment_id": outcome.attachment.id}),
            )?;
        }
        Ok(outcome.attachment)
    }

    /// §4.9 delegation: ingest a remote URL, then enqueue processing.
    pub async fn add_attachment_url(&self, ctx: &RequestContext, memory_id: &str, url: &str) -> Result<Attachment> {
        self.fetch_owned(ctx, memory_id).await?;
        let outcome = self.attachments.ingest_url(memory_id, url).await?;
        if !outcome.duplicate {
            self.enqueue(
                TaskPriority::Normal,
                "process_attachment",
                json!({"tenant_id": ctx.tenant_id, "memory_id": memory_id, "attachment_id": outcome.attachment.id}),
            )?;
        }
        Ok(outcome.attachment)
    }

    /// §4.1 `list` (attachments branch): straight-line delegation to the Store.
    pub async fn list_attachments(&self, ctx: &RequestContext, memory_id: &str) -> Result<Vec<Attachment>> {
        self.fetch_owned_readable(ctx, memory_id).await?;
        self.attachments.list_for_memory(memory_id).await
    }

    /// §4.1 `list`: paginated, tenant-scoped, `created_at DESC` (Open
    /// Question decision, DESIGN.md).
    pub async fn list(&self, ctx: &RequestContext, limit: u32, offset: u32) -> Result<Vec<Memory>> {
        let limit = limit.min(self.config.search.max_limit).max(1);
        let rows = self.db.list_memories(&ctx.tenant_id, limit, offset).await?;
        Ok(rows.into_iter().filter(|m| check_visibility(ctx, m).is_ok()).collect())
    }

    /// §4.7 `generate_embedding(memory_id)` task body. `tenant_id` arrives in
    /// the task payload alongside `memory_id` (§4.7 tasks carry whatever
    /// fields their enqueuer put in, beyond the bare contract name).
    #[tracing::instrument(skip(self))]
    pub async fn handle_generate_embedding(&self, tenant_id: &str, memory_id: &str) -> Result<()> {
        let Some(embeddings) = &self.embeddings else {
            tracing::warn!(memory_id, "generate_embedding task dequeued with no Embedder configured");
            return Ok(());
        };

        let memory = self
            .db
            .get_memory_by_id(tenant_id, memory_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("memory {memory_id} not found")))?;
        let embedding = embeddings.embed_passage(&memory.content).await?;

        let mut updated = memory.clone();
        updated.embedding = Some(embedding);
        self.db.update_memory(&updated).await?;

        cache::invalidate_memory(&self.cache, &memory.tenant_id, &memory.id);
        self.events.publish(EventType::MemoryEmbeddingComplete, memory.tenant_id.clone(), json!({"memory_id": memory.id}));

        Ok(())
    }

    /// §4.7 `extract_entities(memory_id)` task body: extract, then fold into
    /// the Graph (§4.6), associating each resolved entity back to this memory.
    #[tracing::instrument(skip(self))]
    pub async fn handle_extract_entities(&self, tenant_id: &str, memory_id: &str) -> Result<()> {
        let Some(extractor) = &self.extractor else {
            tracing::warn!(memory_id, "extract_entities task dequeued with no Extractor configured");
            return Ok(());
        };

        let memory = self
            .db
            .get_memory_by_id(tenant_id, memory_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("memory {memory_id} not found")))?;
        let extraction = extractor.extract(&memory.content).await?;
        let summary = graph::ingest(self.db.as_ref(), &memory.id, &extraction).await?;

        tracing::debug!(
            memory_id,
            entities_linked = summary.entities_linked,
            relations_created = summary.relations_created,
            "extract_entities task completed"
        );

        Ok(())
    }

    /// §4.7 `process_attachment(attachment_id)` task body: a thin delegation
    /// to the already-built Attachments pipeline (§4.9).
    #[tracing::instrument(skip(self))]
    pub async fn handle_process_attachment(&self, attachment_id: &str) -> Result<()> {
        self.attachments.process(attachment_id).await
    }

    fn enqueue(&self, priority: TaskPriority, name: &str, payload: serde_json::Value) -> Result<()> {
        self.queue.submit(Task::new(name, priority, payload))
    }

    async fn fetch_owned(&self, ctx: &RequestContext, memory_id: &str) -> Result<Memory> {
        let memory = self
            .db
            .get_memory_by_id(&ctx.tenant_id, memory_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("memory {memory_id} not found")))?;
        check_ownership(ctx, &memory)?;
        Ok(memory)
    }

    async fn fetch_owned_readable(&self, ctx: &RequestContext, memory_id: &str) -> Result<Memory> {
        let memory = self
            .db
            .get_memory_by_id(&ctx.tenant_id, memory_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("memory {memory_id} not found")))?;
        check_visibility(ctx, &memory)?;
        Ok(memory)
    }

}

/// §4.2's visibility predicate, applied by the service since it needs the
/// caller's identity/permissions which the Store layer never sees. Shared
/// with the Search Planner (§4.5), which must apply the same predicate to
/// rows it ranks before they ever reach a caller.
pub(crate) fn check_visibility(ctx: &RequestContext, memory: &Memory) -> Result<()> {
    if memory.tenant_id != ctx.tenant_id {
        return Err(CoreError::NotFound("memory not found".to_string()));
    }
    let visible = match memory.visibility {
        Visibility::Public | Visibility::Team => true,
        Visibility::Private => memory.created_by.is_none() || memory.created_by == ctx.user_id,
    };
    if visible || ctx.has_permission(MANAGE_PERMISSION) {
        Ok(())
    } else {
        Err(CoreError::NotFound("memory not found".to_string()))
    }
}

/// Mutation-path ownership check (§4.1: "creator or `memories.manage`
/// permission"), stricter than the read-path visibility predicate. Shared
/// with `services/versioning.rs`'s `rollback`, which is a mutation too.
pub(crate) fn check_ownership(ctx: &RequestContext, memory: &Memory) -> Result<()> {
    check_visibility(ctx, memory)?;
    if memory.created_by.is_none() || memory.created_by == ctx.user_id || ctx.has_permission(MANAGE_PERMISSION) {
        Ok(())
    } else {
        Err(CoreError::Forbidden("not the creator of this memory".to_string()))
    }
}

/// Builds the append-only snapshot row (§3/§4.10) written alongside every
/// mutation. Shared with `services/versioning.rs::rollback`, which writes
/// one too.
pub(crate) fn version_snapshot(memory: &Memory, changed_by: Option<&str>, change_type: ChangeType, change_reason: Option<String>) -> MemoryVersion {
    MemoryVersion {
        memory_id: memory.id.clone(),
        version_number: memory.current_version,
        content: memory.content.clone(),
        title: memory.title.clone(),
        tags: memory.tags.clone(),
        metadata: memory.metadata.clone(),
        changed_by: changed_by.map(str::to_string),
        change_type,
        change_reason,
        created_at: memory.updated_at,
    }
}

/// The §6 wire shape for a Memory record: `has_embedding` replaces the raw
/// vector, which is never serialized to event subscribers or API callers.
fn wire_memory(memory: &Memory) -> serde_json::Value {
    json!({
        "id": memory.id,
        "tenant_id": memory.tenant_id,
        "created_by": memory.created_by,
        "content": memory.content,
        "title": memory.title,
        "tags": memory.tags,
        "metadata": memory.metadata,
        "visibility": memory.visibility,
        "has_embedding": memory.embedding.is_some(),
        "current_version": memory.current_version,
        "created_at": memory.created_at,
        "updated_at": memory.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::attachments::storage::LocalStorageBackend;
    use crate::config::{AttachmentsConfig, CacheConfig, Config, DatabaseConfig, QueueConfig};
    use crate::db::{Database, LibSqlBackend};
    use crate::models::{Tenant, TenantSettings};

    fn test_db_config() -> DatabaseConfig {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let thread_id = std::thread::current().id();
        DatabaseConfig {
            url: format!("file:/tmp/recall_memsvc_test_{thread_id:?}_{timestamp}?mode=memory&cache=shared"),
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

    async fn test_service() -> (MemoryService, Arc<dyn DatabaseBackend>) {
        let db = Database::new(&test_db_config()).await.expect("db init");
        let backend: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(db));

        let mut config = Config::from_env();
        config.tenancy.dedup_window_secs = 300;
        config.search.near_duplicate_threshold = 0.9;
        let config = Arc::new(config);

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
            Arc::new(LocalStorageBackend::new("/tmp/recall_memsvc_test_attachments".into()));
        let attachments = AttachmentService::new(
            backend.clone(),
            storage,
            None,
            None,
            AttachmentsConfig { storage_root: "/tmp/recall_memsvc_test_attachments".into(), max_file_size_bytes: 1024 * 1024, download_timeout_secs: 5 },
        );

        let (queue, _rx) = TaskQueue::new(QueueConfig { workers: 1, max_attempts: 1, shutdown_drain_secs: 1 });
        let queue = Arc::new(queue);

        let service = MemoryService::new(backend.clone(), cache, None, None, attachments, queue, EventBus::new(), config);

        let tenant = Tenant::new("t1".into(), "acme".into(), "free".into(), TenantSettings { max_memories: Some(100), max_file_size_bytes: 1024 * 1024 });
        backend.create_tenant(&tenant).await.expect("create tenant");

        (service, backend)
    }

    fn ctx(user_id: &str) -> RequestContext {
        RequestContext { tenant_id: "t1".into(), user_id: Some(user_id.to_string()), permissions: Vec::new() }
    }

    fn admin_ctx() -> RequestContext {
        RequestContext { tenant_id: "t1".into(), user_id: Some("admin".into()), permissions: vec![MANAGE_PERMISSION.to_string()] }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (service, _db) = test_service().await;
        let request = CreateMemoryRequest { content: "hello world".into(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), ..Default::default() };

        let outcome = service.create("t1", request, options).await.expect("create");
        let CreateOutcome::Created(memory) = outcome else { panic!("expected Created") };

        let (fetched, effective) = service.get(&ctx("u1"), &memory.id).await.expect("get");
        assert_eq!(fetched.content, "hello world");
        assert_eq!(effective, "hello world");
    }

    #[tokio::test]
    async fn duplicate_within_window_is_reported_without_a_new_row() {
        let (service, _db) = test_service().await;
        let request = CreateMemoryRequest { content: "Ship the release today".into(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), ..Default::default() };

        service.create("t1", request.clone(), options.clone()).await.expect("first create");
        let second = service.create("t1", request, options).await.expect("second create");

        match second {
            CreateOutcome::DuplicateFound { similarity, .. } => assert!(similarity >= 0.99),
            other => panic!("expected DuplicateFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn force_bypasses_dedup() {
        let (service, _db) = test_service().await;
        let request = CreateMemoryRequest { content: "Ship the release today".into(), ..Default::default() };
        let mut options = CreateOptions { created_by: Some("u1".into()), ..Default::default() };

        service.create("t1", request.clone(), options.clone()).await.expect("first create");
        options.force = true;
        let second = service.create("t1", request, options).await.expect("second create");
        assert!(matches!(second, CreateOutcome::Created(_)));
    }

    #[tokio::test]
    async fn private_memory_is_invisible_to_other_users() {
        let (service, _db) = test_service().await;
        let request = CreateMemoryRequest { content: "Secret".into(), visibility: Some(Visibility::Private), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), ..Default::default() };

        let CreateOutcome::Created(memory) = service.create("t1", request, options).await.expect("create") else {
            panic!("expected Created")
        };

        let err = service.get(&ctx("u2"), &memory.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let (fetched, _) = service.get(&admin_ctx(), &memory.id).await.expect("admin can read");
        assert_eq!(fetched.id, memory.id);
    }

    #[tokio::test]
    async fn update_increments_version_and_records_history() {
        let (service, db) = test_service().await;
        let request = CreateMemoryRequest { content: "v1".into(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), ..Default::default() };
        let CreateOutcome::Created(memory) = service.create("t1", request, options).await.expect("create") else {
            panic!("expected Created")
        };

        let update_request = UpdateMemoryRequest { content: Some("v2".into()), ..Default::default() };
        let updated = service.update(&ctx("u1"), &memory.id, update_request, false).await.expect("update");
        assert_eq!(updated.content, "v2");
        assert_eq!(updated.current_version, 2);

        let versions = db.get_versions(&memory.id).await.expect("versions");
        assert_eq!(versions.len(), 2);
    }

    #[tokio::test]
    async fn non_creator_cannot_update() {
        let (service, _db) = test_service().await;
        let request = CreateMemoryRequest { content: "v1".into(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), ..Default::default() };
        let CreateOutcome::Created(memory) = service.create("t1", request, options).await.expect("create") else {
            panic!("expected Created")
        };

        let update_request = UpdateMemoryRequest { content: Some("hijacked".into()), ..Default::default() };
        let err = service.update(&ctx("u2"), &memory.id, update_request, false).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn delete_removes_the_memory() {
        let (service, _db) = test_service().await;
        let request = CreateMemoryRequest { content: "throwaway".into(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), ..Default::default() };
        let CreateOutcome::Created(memory) = service.create("t1", request, options).await.expect("create") else {
            panic!("expected Created")
        };

        service.delete(&ctx("u1"), &memory.id).await.expect("delete");
        let err = service.get(&ctx("u1"), &memory.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn add_correction_overrides_effective_content_without_touching_stored_content() {
        let (service, _db) = test_service().await;
        let request = CreateMemoryRequest { content: "The meeting is on 2024-06-15".into(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), ..Default::default() };
        let CreateOutcome::Created(memory) = service.create("t1", request, options).await.expect("create") else {
            panic!("expected Created")
        };

        service
            .add_correction(&ctx("u1"), &memory.id, "The meeting is on 2024-06-22".into(), Some("rescheduled".into()))
            .await
            .expect("add_correction");

        let (fetched, effective) = service.get(&ctx("u1"), &memory.id).await.expect("get");
        assert_eq!(fetched.content, "The meeting is on 2024-06-15");
        assert_eq!(effective, "The meeting is on 2024-06-22");
    }

    #[tokio::test]
    async fn auto_merge_tag_folds_into_existing_memory_instead_of_warning() {
        let (service, _db) = test_service().await;
        let mut tags = HashSet::new();
        tags.insert("auto-merge".to_string());

        let first = CreateMemoryRequest { content: "Project kickoff notes".into(), tags: tags.clone(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), ..Default::default() };
        let CreateOutcome::Created(original) = service.create("t1", first, options.clone()).await.expect("create") else {
            panic!("expected Created")
        };

        let second = CreateMemoryRequest { content: "Project kickoff notes plus action items".into(), tags, ..Default::default() };
        let outcome = service.create("t1", second, options).await.expect("second create");

        match outcome {
            CreateOutcome::Merged(merged) => {
                assert_eq!(merged.id, original.id);
                assert!(merged.content.contains("action items"));
            }
            other => panic!("expected Merged, got {other:?}"),
        }
    }
}
