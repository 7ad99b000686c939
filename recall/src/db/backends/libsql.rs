use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::connection::Database;
use crate::db::repository::{
    ActionItemRepository, AttachmentRepository, ConversationLinkRepository, CorrectionRepository,
    EntityRepository, ExternalReferenceRepository, MemoryRepository, TenantRepository,
    UserRepository, VersionRepository,
};
use crate::db::traits::{
    ActionItemStore, AttachmentStore, ConversationLinkStore, CorrectionStore, DatabaseBackend,
    EntityStore, ExternalReferenceStore, MemoryStore, MetadataStore, TenantStore, UserStore,
    VersionStore,
};
use crate::db::MetadataRepository;
use crate::error::Result;
use crate::models::{
    ActionItem, Attachment, ConversationLink, Correction, Entity, ExternalReference, Memory,
    MemoryEntityAssociation, MemoryVersion, Relation, Tenant, User,
};

pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TenantStore for LibSqlBackend {
    async fn create_tenant(&self, tenant: &Tenant) -> Result<()> {
        let conn = self.db.connect()?;
        TenantRepository::create(&conn, tenant).await
    }
    async fn get_tenant_by_id(&self, id: &str) -> Result<Option<Tenant>> {
        let conn = self.db.connect()?;
        TenantRepository::get_by_id(&conn, id).await
    }
    async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        let conn = self.db.connect()?;
        TenantRepository::get_by_slug(&conn, slug).await
    }
    async fn count_memories_for_tenant(&self, tenant_id: &str) -> Result<i64> {
        let conn = self.db.connect()?;
        TenantRepository::count_memories(&conn, tenant_id).await
    }
}

#[async_trait]
impl UserStore for LibSqlBackend {
    async fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.db.connect()?;
        UserRepository::create(&conn, user).await
    }
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.db.connect()?;
        UserRepository::get_by_id(&conn, id).await
    }
    async fn get_user_by_email(&self, tenant_id: &str, email: &str) -> Result<Option<User>> {
        let conn = self.db.connect()?;
        UserRepository::get_by_email(&conn, tenant_id, email).await
    }
    async fn delete_user(&self, id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        UserRepository::delete(&conn, id).await
    }
}

#[async_trait]
impl MemoryStore for LibSqlBackend {
    async fn create_memory(&self, memory: &Memory) -> Result<()> {
        let conn = self.db.connect()?;
        MemoryRepository::create(&conn, memory).await
    }
    async fn get_memory_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<Memory>> {
        let conn = self.db.connect()?;
        MemoryRepository::get_by_id(&conn, tenant_id, id).await
    }
    async fn get_memories_by_ids(&self, tenant_id: &str, ids: &[String]) -> Result<Vec<Memory>> {
        let conn = self.db.connect()?;
        MemoryRepository::get_by_ids(&conn, tenant_id, ids).await
    }
    async fn update_memory(&self, memory: &Memory) -> Result<()> {
        let conn = self.db.connect()?;
        MemoryRepository::update(&conn, memory).await
    }
    async fn delete_memory(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        MemoryRepository::delete(&conn, tenant_id, id).await
    }
    async fn list_memories(&self, tenant_id: &str, limit: u32, offset: u32) -> Result<Vec<Memory>> {
        let conn = self.db.connect()?;
        MemoryRepository::list(&conn, tenant_id, limit, offset).await
    }
    async fn fetch_keyword_candidates(&self, tenant_id: &str, limit: u32) -> Result<Vec<Memory>> {
        let conn = self.db.connect()?;
        MemoryRepository::fetch_keyword_candidates(&conn, tenant_id, limit).await
    }
    async fn search_similar_memories(
        &self,
        tenant_id: &str,
        embedding: &[f32],
        limit: u32,
        threshold: f32,
    ) -> Result<Vec<(Memory, f32)>> {
        let conn = self.db.connect()?;
        MemoryRepository::search_similar(&conn, tenant_id, embedding, limit, threshold).await
    }
    async fn recent_memories_for_dedup(&self, tenant_id: &str, since: DateTime<Utc>) -> Result<Vec<Memory>> {
        let conn = self.db.connect()?;
        MemoryRepository::recent_for_dedup(&conn, tenant_id, since).await
    }
}

#[async_trait]
impl VersionStore for LibSqlBackend {
    async fn create_version(&self, version: &MemoryVersion) -> Result<()> {
        let conn = self.db.connect()?;
        VersionRepository::create(&conn, version).await
    }
    async fn get_versions(&self, memory_id: &str) -> Result<Vec<MemoryVersion>> {
        let conn = self.db.connect()?;
        VersionRepository::get_all(&conn, memory_id).await
    }
    async fn get_version(&self, memory_id: &str, version_number: i64) -> Result<Option<MemoryVersion>> {
        let conn = self.db.connect()?;
        VersionRepository::get_one(&conn, memory_id, version_number).await
    }
    async fn prune_versions(&self, memory_id: &str, keep: u32) -> Result<()> {
        let conn = self.db.connect()?;
        VersionRepository::prune(&conn, memory_id, keep).await
    }
}

#[async_trait]
impl CorrectionStore for LibSqlBackend {
    async fn create_correction(&self, correction: &Correction) -> Result<()> {
        let conn = self.db.connect()?;
        CorrectionRepository::create(&conn, correction).await
    }
    async fn get_corrections(&self, memory_id: &str) -> Result<Vec<Correction>> {
        let conn = self.db.connect()?;
        CorrectionRepository::get_all(&conn, memory_id).await
    }
    async fn get_latest_correction(&self, memory_id: &str) -> Result<Option<Correction>> {
        let conn = self.db.connect()?;
        CorrectionRepository::get_latest(&conn, memory_id).await
    }
}

#[async_trait]
impl AttachmentStore for LibSqlBackend {
    async fn create_attachment(&self, attachment: &Attachment) -> Result<()> {
        let conn = self.db.connect()?;
        AttachmentRepository::create(&conn, attachment).await
    }
    async fn get_attachment_by_id(&self, id: &str) -> Result<Option<Attachment>> {
        let conn = self.db.connect()?;
        AttachmentRepository::get_by_id(&conn, id).await
    }
    async fn get_attachment_by_hash(&self, memory_id: &str, file_hash: &str) -> Result<Option<Attachment>> {
        let conn = self.db.connect()?;
        AttachmentRepository::get_by_hash(&conn, memory_id, file_hash).await
    }
    async fn get_attachments_by_memory(&self, memory_id: &str) -> Result<Vec<Attachment>> {
        let conn = self.db.connect()?;
        AttachmentRepository::get_by_memory(&conn, memory_id).await
    }
    async fn update_attachment(&self, attachment: &Attachment) -> Result<()> {
        let conn = self.db.connect()?;
        AttachmentRepository::update(&conn, attachment).await
    }
    async fn delete_attachments_by_memory(&self, memory_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        AttachmentRepository::delete_by_memory(&conn, memory_id).await
    }
}

#[async_trait]
impl EntityStore for LibSqlBackend {
    async fn upsert_entity(&self, entity: &Entity) -> Result<()> {
        let conn = self.db.connect()?;
        EntityRepository::upsert(&conn, entity).await?;
        Ok(())
    }
    async fn get_entity_by_id(&self, id: &str) -> Result<Option<Entity>> {
        let conn = self.db.connect()?;
        EntityRepository::get_by_id(&conn, id).await
    }
    async fn find_entity_by_name_or_alias(&self, name_key: &str) -> Result<Option<Entity>> {
        let conn = self.db.connect()?;
        EntityRepository::find_by_name_key(&conn, name_key).await
    }
    async fn search_entities(&self, query: &str, limit: u32) -> Result<Vec<Entity>> {
        let conn = self.db.connect()?;
        EntityRepository::search(&conn, query, limit).await
    }
    async fn upsert_relation(&self, relation: &Relation) -> Result<()> {
        let conn = self.db.connect()?;
        EntityRepository::upsert_relation(&conn, relation).await?;
        Ok(())
    }
    async fn get_relation(&self, from_entity_id: &str, to_entity_id: &str, relation_type: &str) -> Result<Option<Relation>> {
        let conn = self.db.connect()?;
        EntityRepository::get_relation(&conn, from_entity_id, to_entity_id, relation_type).await
    }
    async fn get_relations_for_entity(&self, entity_id: &str) -> Result<Vec<Relation>> {
        let conn = self.db.connect()?;
        EntityRepository::get_relations_for_entity(&conn, entity_id).await
    }
    async fn associate_memory_entity(&self, assoc: &MemoryEntityAssociation) -> Result<()> {
        let conn = self.db.connect()?;
        EntityRepository::associate_memory_entity(&conn, &assoc.memory_id, &assoc.entity_id, assoc.relevance_score).await
    }
    async fn delete_associations_by_memory(&self, memory_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        EntityRepository::delete_associations_by_memory(&conn, memory_id).await
    }
    async fn get_entities_for_memory(&self, memory_id: &str) -> Result<Vec<(Entity, f32)>> {
        let conn = self.db.connect()?;
        EntityRepository::get_entities_for_memory(&conn, memory_id).await
    }
    async fn get_memories_for_entity(
        &self,
        tenant_id: &str,
        entity_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<(Memory, f32)>> {
        let conn = self.db.connect()?;
        EntityRepository::get_memories_for_entity(&conn, tenant_id, entity_id, limit, offset).await
    }
}

#[async_trait]
impl ActionItemStore for LibSqlBackend {
    async fn create_action_item(&self, item: &ActionItem) -> Result<()> {
        let conn = self.db.connect()?;
        ActionItemRepository::create(&conn, item).await
    }
    async fn get_action_items_by_memory(&self, memory_id: &str) -> Result<Vec<ActionItem>> {
        let conn = self.db.connect()?;
        ActionItemRepository::get_by_memory(&conn, memory_id).await
    }
    async fn update_action_item(&self, item: &ActionItem) -> Result<()> {
        let conn = self.db.connect()?;
        ActionItemRepository::update(&conn, item).await
    }
}

#[async_trait]
impl ExternalReferenceStore for LibSqlBackend {
    async fn create_external_reference(&self, reference: &ExternalReference) -> Result<()> {
        let conn = self.db.connect()?;
        ExternalReferenceRepository::create(&conn, reference).await
    }
    async fn get_external_references_by_memory(&self, memory_id: &str) -> Result<Vec<ExternalReference>> {
        let conn = self.db.connect()?;
        ExternalReferenceRepository::get_by_memory(&conn, memory_id).await
    }
}

#[async_trait]
impl ConversationLinkStore for LibSqlBackend {
    async fn create_conversation_link(&self, link: &ConversationLink) -> Result<()> {
        let conn = self.db.connect()?;
        ConversationLinkRepository::create(&conn, link).await
    }
    async fn get_links_for_conversation(&self, conversation_id: &str) -> Result<Vec<ConversationLink>> {
        let conn = self.db.connect()?;
        ConversationLinkRepository::get_for_conversation(&conn, conversation_id).await
    }
}

#[async_trait]
impl MetadataStore for LibSqlBackend {
    async fn get_embedding_dimensions(&self) -> Result<Option<usize>> {
        let conn = self.db.connect()?;
        MetadataRepository::get_embedding_dimensions(&conn).await
    }
    async fn set_embedding_dimensions(&self, dims: usize) -> Result<()> {
        let conn = self.db.connect()?;
        MetadataRepository::set_embedding_dimensions(&conn, dims).await
    }
}

#[async_trait]
impl DatabaseBackend for LibSqlBackend {
    async fn sync(&self) -> Result<()> {
        self.db.sync().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::connection::Database;

    fn test_config(url: String) -> DatabaseConfig {
        DatabaseConfig {
            url,
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

    async fn setup_test_db() -> LibSqlBackend {
        use std::time::{SystemTime, UNIX_EPOCH};

        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let thread_id = std::thread::current().id();

        let config = test_config(format!(
            "file:/tmp/recall_test_db_{thread_id:?}_{timestamp}?mode=memory&cache=shared"
        ));
        let db = Database::new(&config).await.expect("failed to create database");
        LibSqlBackend::new(db)
    }

    fn test_tenant(id: &str, slug: &str) -> Tenant {
        Tenant::new(
            id.into(),
            slug.into(),
            "free".into(),
            crate::models::TenantSettings {
                max_memories: None,
                max_file_size_bytes: 50 * 1024 * 1024,
            },
        )
    }

    #[tokio::test]
    async fn test_tenant_roundtrip_through_backend() {
        let backend = setup_test_db().await;
        let tenant = test_tenant("t1", "acme");
        backend.create_tenant(&tenant).await.unwrap();

        let fetched = backend.get_tenant_by_slug("acme").await.unwrap().unwrap();
        assert_eq!(fetched.id, "t1");
    }

    #[tokio::test]
    async fn test_memory_roundtrip_through_backend() {
        let backend = setup_test_db().await;
        let tenant = test_tenant("t1", "acme");
        backend.create_tenant(&tenant).await.unwrap();

        let memory = Memory::new("m1".into(), "t1".into(), None, "hello".into());
        backend.create_memory(&memory).await.unwrap();

        let fetched = backend.get_memory_by_id("t1", "m1").await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello");
    }

    #[tokio::test]
    async fn test_sync_is_noop_for_local_backend() {
        let backend = setup_test_db().await;
        backend.sync().await.unwrap();
    }
}
