use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ActionItem, Attachment, ConversationLink, Correction, Entity, ExternalReference, Memory,
    MemoryEntityAssociation, MemoryVersion, Relation, Tenant, User,
};

/// CRUD for tenants (§3). Tenants are created once and never deleted while
/// they own memories.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn create_tenant(&self, tenant: &Tenant) -> Result<()>;
    async fn get_tenant_by_id(&self, id: &str) -> Result<Option<Tenant>>;
    async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>>;
    async fn count_memories_for_tenant(&self, tenant_id: &str) -> Result<i64>;
}

/// CRUD for users. Deleting a user cascades its Memories' `created_by` to
/// null rather than deleting the memories themselves (§3).
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<()>;
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>>;
    async fn get_user_by_email(&self, tenant_id: &str, email: &str) -> Result<Option<User>>;
    async fn delete_user(&self, id: &str) -> Result<bool>;
}

/// CRUD, listing, and vector-search operations for the Memory aggregate.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn create_memory(&self, memory: &Memory) -> Result<()>;
    async fn get_memory_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<Memory>>;
    async fn get_memories_by_ids(&self, tenant_id: &str, ids: &[String]) -> Result<Vec<Memory>>;
    async fn update_memory(&self, memory: &Memory) -> Result<()>;
    async fn delete_memory(&self, tenant_id: &str, id: &str) -> Result<bool>;
    async fn list_memories(
        &self,
        tenant_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Memory>>;

    /// Tenant-scoped candidate rows for keyword/trigram ranking, bounded by
    /// an upper fetch size — trigram similarity itself is scored in Rust
    /// over this set (see `search/keyword.rs`).
    async fn fetch_keyword_candidates(&self, tenant_id: &str, limit: u32) -> Result<Vec<Memory>>;

    async fn search_similar_memories(
        &self,
        tenant_id: &str,
        embedding: &[f32],
        limit: u32,
        threshold: f32,
    ) -> Result<Vec<(Memory, f32)>>;

    /// Exact-duplicate and near-duplicate candidate lookup for the Deduper,
    /// scoped to a trailing time window (§4.4).
    async fn recent_memories_for_dedup(
        &self,
        tenant_id: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Memory>>;
}

/// Append-only version history plus rollback support (§4.10).
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn create_version(&self, version: &MemoryVersion) -> Result<()>;
    async fn get_versions(&self, memory_id: &str) -> Result<Vec<MemoryVersion>>;
    async fn get_version(&self, memory_id: &str, version_number: i64) -> Result<Option<MemoryVersion>>;
    /// Deletes all but the `keep` most recent versions of `memory_id`. The
    /// current version is always among the most recent, so it is never
    /// pruned by construction.
    async fn prune_versions(&self, memory_id: &str, keep: u32) -> Result<()>;
}

#[async_trait]
pub trait CorrectionStore: Send + Sync {
    async fn create_correction(&self, correction: &Correction) -> Result<()>;
    async fn get_corrections(&self, memory_id: &str) -> Result<Vec<Correction>>;
    async fn get_latest_correction(&self, memory_id: &str) -> Result<Option<Correction>>;
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn create_attachment(&self, attachment: &Attachment) -> Result<()>;
    async fn get_attachment_by_id(&self, id: &str) -> Result<Option<Attachment>>;
    async fn get_attachment_by_hash(&self, memory_id: &str, file_hash: &str) -> Result<Option<Attachment>>;
    async fn get_attachments_by_memory(&self, memory_id: &str) -> Result<Vec<Attachment>>;
    async fn update_attachment(&self, attachment: &Attachment) -> Result<()>;
    async fn delete_attachments_by_memory(&self, memory_id: &str) -> Result<u64>;
}

/// Global entity store plus the tenant-scoped association join (§4.6).
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn upsert_entity(&self, entity: &Entity) -> Result<()>;
    async fn get_entity_by_id(&self, id: &str) -> Result<Option<Entity>>;
    async fn find_entity_by_name_or_alias(&self, name_key: &str) -> Result<Option<Entity>>;
    async fn search_entities(&self, query: &str, limit: u32) -> Result<Vec<Entity>>;

    async fn upsert_relation(&self, relation: &Relation) -> Result<()>;
    async fn get_relation(
        &self,
        from_entity_id: &str,
        to_entity_id: &str,
        relation_type: &str,
    ) -> Result<Option<Relation>>;
    async fn get_relations_for_entity(&self, entity_id: &str) -> Result<Vec<Relation>>;

    async fn associate_memory_entity(&self, assoc: &MemoryEntityAssociation) -> Result<()>;
    async fn delete_associations_by_memory(&self, memory_id: &str) -> Result<u64>;
    async fn get_entities_for_memory(&self, memory_id: &str) -> Result<Vec<(Entity, f32)>>;
    async fn get_memories_for_entity(
        &self,
        tenant_id: &str,
        entity_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<(Memory, f32)>>;
}

#[async_trait]
pub trait ActionItemStore: Send + Sync {
    async fn create_action_item(&self, item: &ActionItem) -> Result<()>;
    async fn get_action_items_by_memory(&self, memory_id: &str) -> Result<Vec<ActionItem>>;
    async fn update_action_item(&self, item: &ActionItem) -> Result<()>;
}

#[async_trait]
pub trait ExternalReferenceStore: Send + Sync {
    async fn create_external_reference(&self, reference: &ExternalReference) -> Result<()>;
    async fn get_external_references_by_memory(&self, memory_id: &str) -> Result<Vec<ExternalReference>>;
}

#[async_trait]
pub trait ConversationLinkStore: Send + Sync {
    async fn create_conversation_link(&self, link: &ConversationLink) -> Result<()>;
    async fn get_links_for_conversation(&self, conversation_id: &str) -> Result<Vec<ConversationLink>>;
}

/// Deployment-wide key-value metadata (e.g. the embedding dimension locked in
/// on first write).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_embedding_dimensions(&self) -> Result<Option<usize>>;
    async fn set_embedding_dimensions(&self, dims: usize) -> Result<()>;
}

/// A complete database backend combining every store trait plus lifecycle
/// operations (initialization, replica sync).
#[async_trait]
pub trait DatabaseBackend:
    TenantStore
    + UserStore
    + MemoryStore
    + VersionStore
    + CorrectionStore
    + AttachmentStore
    + EntityStore
    + ActionItemStore
    + ExternalReferenceStore
    + ConversationLinkStore
    + MetadataStore
{
    /// Sync with remote (e.g. Turso replication). No-op for local-only backends.
    async fn sync(&self) -> Result<()>;
}
