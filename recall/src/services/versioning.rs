//! Versioning Service (§4.10). Every mutation to a Memory already appends a
//! row via `services/memory.rs`'s `version_snapshot`/`create_version`/
//! `prune_versions` triad; this service is the read side (history, a single
//! version, a field-level diff) plus `rollback`, which is itself one more
//! mutation that goes through that same triad.

use std::sync::Arc;

use crate::config::Config;
use crate::db::DatabaseBackend;
use crate::error::{CoreError, Result};
use crate::models::{ChangeType, Memory, MemoryVersion, RequestContext, VersionDiff};
use crate::services::memory::{check_ownership, check_visibility, version_snapshot};

#[derive(Clone)]
pub struct VersioningService {
    db: Arc<dyn DatabaseBackend>,
    config: Arc<Config>,
}

impl VersioningService {
    pub fn new(db: Arc<dyn DatabaseBackend>, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    /// Most recent `limit` versions, newest first.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn get_version_history(&self, ctx: &RequestContext, memory_id: &str, limit: usize) -> Result<Vec<MemoryVersion>> {
        self.fetch_readable(ctx, memory_id).await?;

        let mut versions = self.db.get_versions(memory_id).await?;
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        versions.truncate(limit);
        Ok(versions)
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn get_specific_version(&self, ctx: &RequestContext, memory_id: &str, version_number: i64) -> Result<MemoryVersion> {
        self.fetch_readable(ctx, memory_id).await?;

        self.db
            .get_version(memory_id, version_number)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("memory {memory_id} has no version {version_number}")))
    }

    /// Field-level diff between two versions (§4.10): content/title/tags/
    /// metadata changed flags plus the tag set delta.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn compare_versions(&self, ctx: &RequestContext, memory_id: &str, v1: i64, v2: i64) -> Result<VersionDiff> {
        self.fetch_readable(ctx, memory_id).await?;

        let from = self
            .db
            .get_version(memory_id, v1)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("memory {memory_id} has no version {v1}")))?;
        let to = self
            .db
            .get_version(memory_id, v2)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("memory {memory_id} has no version {v2}")))?;

        Ok(VersionDiff::compute(&from, &to))
    }

    /// Rolls back to `target_version` by writing a *new* version whose
    /// content/title/tags/metadata equal that version's (§4.10) — it never
    /// rewrites or deletes history, it only appends to it.
    #[tracing::instrument(skip(self, ctx, change_reason))]
    pub async fn rollback(&self, ctx: &RequestContext, memory_id: &str, target_version: i64, change_reason: Option<String>) -> Result<Memory> {
        let mut memory = self.fetch_owned(ctx, memory_id).await?;

        let target = self
            .db
            .get_version(memory_id, target_version)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("memory {memory_id} has no version {target_version}")))?;

        memory.content = target.content;
        memory.title = target.title;
        memory.tags = target.tags;
        memory.metadata = target.metadata;
        memory.current_version += 1;
        memory.updated_at = chrono::Utc::now();

        self.db.update_memory(&memory).await?;
        self.db
            .create_version(&version_snapshot(&memory, ctx.user_id.as_deref(), ChangeType::Rollback, change_reason))
            .await?;
        self.db.prune_versions(&memory.id, self.config.versioning.max_versions_retained).await?;

        Ok(memory)
    }

    async fn fetch_readable(&self, ctx: &RequestContext, memory_id: &str) -> Result<Memory> {
        let memory = self
            .db
            .get_memory_by_id(&ctx.tenant_id, memory_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("memory {memory_id} not found")))?;
        check_visibility(ctx, &memory)?;
        Ok(memory)
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
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::attachments::storage::LocalStorageBackend;
    use crate::attachments::AttachmentService;
    use crate::cache::Cache;
    use crate::config::{AttachmentsConfig, CacheConfig, DatabaseConfig, QueueConfig};
    use crate::db::{Database, LibSqlBackend};
    use crate::events::EventBus;
    use crate::models::{CreateMemoryRequest, Tenant, TenantSettings, UpdateMemoryRequest};
    use crate::queue::TaskQueue;
    use crate::services::memory::{CreateOptions, CreateOutcome, MemoryService};

    fn test_db_config() -> DatabaseConfig {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let thread_id = std::thread::current().id();
        DatabaseConfig {
            url: format!("file:/tmp/recall_versioning_test_{thread_id:?}_{timestamp}?mode=memory&cache=shared"),
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

    async fn test_harness() -> (MemoryService, VersioningService, Arc<dyn DatabaseBackend>) {
        let db = Database::new(&test_db_config()).await.expect("db init");
        let backend: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(db));

        let mut config = Config::from_env();
        config.versioning.max_versions_retained = 2;
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
            Arc::new(LocalStorageBackend::new("/tmp/recall_versioning_test_attachments".into()));
        let attachments = AttachmentService::new(
            backend.clone(),
            storage,
            None,
            None,
            AttachmentsConfig { storage_root: "/tmp/recall_versioning_test_attachments".into(), max_file_size_bytes: 1024 * 1024, download_timeout_secs: 5 },
        );
        let (queue, _rx) = TaskQueue::new(QueueConfig { workers: 1, max_attempts: 1, shutdown_drain_secs: 1 });

        let memory_service = MemoryService::new(backend.clone(), cache, None, None, attachments, Arc::new(queue), EventBus::new(), config.clone());
        let versioning_service = VersioningService::new(backend.clone(), config);

        let tenant = Tenant::new("t1".into(), "acme".into(), "free".into(), TenantSettings { max_memories: Some(1000), max_file_size_bytes: 1024 * 1024 });
        backend.create_tenant(&tenant).await.expect("create tenant");

        (memory_service, versioning_service, backend)
    }

    fn ctx() -> RequestContext {
        RequestContext { tenant_id: "t1".into(), user_id: Some("u1".into()), permissions: Vec::new() }
    }

    #[tokio::test]
    async fn history_lists_versions_newest_first() {
        let (memory_service, versioning_service, _db) = test_harness().await;
        let request = CreateMemoryRequest { content: "v1 content".to_string(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), force: true, run_async: false, ..Default::default() };
        let CreateOutcome::Created(memory) = memory_service.create("t1", request, options).await.unwrap() else {
            panic!("expected Created")
        };

        memory_service
            .update(&ctx(), &memory.id, UpdateMemoryRequest { content: Some("v2 content".to_string()), ..Default::default() }, false)
            .await
            .unwrap();

        let history = versioning_service.get_version_history(&ctx(), &memory.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version_number, 2);
        assert_eq!(history[1].version_number, 1);
    }

    #[tokio::test]
    async fn rollback_appends_a_new_version_matching_the_target_content() {
        let (memory_service, versioning_service, _db) = test_harness().await;
        let request = CreateMemoryRequest { content: "original content".to_string(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), force: true, run_async: false, ..Default::default() };
        let CreateOutcome::Created(memory) = memory_service.create("t1", request, options).await.unwrap() else {
            panic!("expected Created")
        };

        memory_service
            .update(&ctx(), &memory.id, UpdateMemoryRequest { content: Some("changed content".to_string()), ..Default::default() }, false)
            .await
            .unwrap();

        let rolled_back = versioning_service.rollback(&ctx(), &memory.id, 1, Some("undo".to_string())).await.unwrap();

        assert_eq!(rolled_back.content, "original content");
        assert_eq!(rolled_back.current_version, 3);

        let history = versioning_service.get_version_history(&ctx(), &memory.id, 10).await.unwrap();
        assert_eq!(history[0].change_type, ChangeType::Rollback);
    }

    #[tokio::test]
    async fn compare_versions_reports_content_change() {
        let (memory_service, versioning_service, _db) = test_harness().await;
        let request = CreateMemoryRequest { content: "hello".to_string(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), force: true, run_async: false, ..Default::default() };
        let CreateOutcome::Created(memory) = memory_service.create("t1", request, options).await.unwrap() else {
            panic!("expected Created")
        };
        memory_service
            .update(&ctx(), &memory.id, UpdateMemoryRequest { content: Some("goodbye".to_string()), ..Default::default() }, false)
            .await
            .unwrap();

        let diff = versioning_service.compare_versions(&ctx(), &memory.id, 1, 2).await.unwrap();
        assert!(diff.content_changed);
    }

    #[tokio::test]
    async fn pruning_keeps_only_the_configured_number_of_versions() {
        let (memory_service, versioning_service, _db) = test_harness().await;
        let request = CreateMemoryRequest { content: "v1".to_string(), ..Default::default() };
        let options = CreateOptions { created_by: Some("u1".into()), force: true, run_async: false, ..Default::default() };
        let CreateOutcome::Created(memory) = memory_service.create("t1", request, options).await.unwrap() else {
            panic!("expected Created")
        };

        for content in ["v2", "v3", "v4"] {
            memory_service
                .update(&ctx(), &memory.id, UpdateMemoryRequest { content: Some(content.to_string()), ..Default::default() }, false)
                .await
                .unwrap();
        }

        let history = versioning_service.get_version_history(&ctx(), &memory.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version_number, 4);
        assert_eq!(history[1].version_number, 3);
    }
}
