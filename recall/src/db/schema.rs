use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            plan TEXT NOT NULL DEFAULT 'free',
            max_memories INTEGER,
            max_file_size_bytes INTEGER NOT NULL,
            metadata TEXT DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'member',
            permissions TEXT DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (tenant_id) REFERENCES tenants(id),
            UNIQUE (tenant_id, email)
        );

        CREATE INDEX IF NOT EXISTS idx_users_tenant_id ON users(tenant_id);

        -- Memory aggregate root. `embedding` is written once the Embedder
        -- completes; NULL until then.
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            created_by TEXT,
            content TEXT NOT NULL,
            title TEXT,
            tags TEXT DEFAULT '[]',
            metadata TEXT DEFAULT '{}',
            visibility TEXT NOT NULL DEFAULT 'private',
            embedding F32_BLOB(384),
            current_version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (tenant_id) REFERENCES tenants(id),
            FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memories_tenant_id ON memories(tenant_id);
        CREATE INDEX IF NOT EXISTS idx_memories_tenant_created_at ON memories(tenant_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_memories_visibility ON memories(visibility);

        -- Append-only version history. `version_number` is monotonic per memory.
        CREATE TABLE IF NOT EXISTS memory_versions (
            memory_id TEXT NOT NULL,
            version_number INTEGER NOT NULL,
            content TEXT NOT NULL,
            title TEXT,
            tags TEXT DEFAULT '[]',
            metadata TEXT DEFAULT '{}',
            changed_by TEXT,
            change_type TEXT NOT NULL,
            change_reason TEXT,
            created_at TEXT NOT NULL,
            PRIMARY KEY (memory_id, version_number),
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS corrections (
            id TEXT PRIMARY KEY,
            memory_id TEXT NOT NULL,
            corrected_content TEXT NOT NULL,
            original_content_snapshot TEXT NOT NULL,
            reason TEXT,
            corrected_by TEXT,
            corrected_at TEXT NOT NULL,
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_corrections_memory_id ON corrections(memory_id, corrected_at);

        CREATE TABLE IF NOT EXISTS attachments (
            id TEXT PRIMARY KEY,
            memory_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            file_hash TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            upload_status TEXT NOT NULL DEFAULT 'pending',
            processing_status TEXT NOT NULL DEFAULT 'pending',
            extracted_text TEXT,
            extracted_metadata TEXT DEFAULT '{}',
            content_description TEXT,
            thumbnail_path TEXT,
            content_embedding F32_BLOB(384),
            embedding_model TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE,
            UNIQUE (memory_id, file_hash)
        );

        CREATE INDEX IF NOT EXISTS idx_attachments_memory_id ON attachments(memory_id);

        -- Entities are global to the deployment, never owned by a single tenant
        -- row; tenant scoping happens through memory_entity_associations.
        CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL,
            entity_type TEXT NOT NULL DEFAULT 'other',
            aliases TEXT DEFAULT '[]',
            attributes TEXT DEFAULT '{}',
            occurrence_count INTEGER NOT NULL DEFAULT 1,
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            embedding F32_BLOB(384)
        );

        CREATE INDEX IF NOT EXISTS idx_entities_name_key ON entities(name_key);
        CREATE INDEX IF NOT EXISTS idx_entities_occurrence_count ON entities(occurrence_count);

        CREATE TABLE IF NOT EXISTS relations (
            id TEXT PRIMARY KEY,
            from_entity_id TEXT NOT NULL,
            to_entity_id TEXT NOT NULL,
            relation_type TEXT NOT NULL,
            attributes TEXT DEFAULT '{}',
            confidence REAL NOT NULL DEFAULT 0.5,
            source_memory_id TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (from_entity_id) REFERENCES entities(id),
            FOREIGN KEY (to_entity_id) REFERENCES entities(id),
            UNIQUE (from_entity_id, to_entity_id, relation_type)
        );

        CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_entity_id);
        CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_entity_id);

        CREATE TABLE IF NOT EXISTS memory_entity_associations (
            memory_id TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            relevance_score REAL NOT NULL DEFAULT 0.5,
            PRIMARY KEY (memory_id, entity_id),
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE,
            FOREIGN KEY (entity_id) REFERENCES entities(id)
        );

        CREATE INDEX IF NOT EXISTS idx_mea_entity_id ON memory_entity_associations(entity_id);

        CREATE TABLE IF NOT EXISTS action_items (
            id TEXT PRIMARY KEY,
            memory_id TEXT NOT NULL,
            text TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            priority TEXT,
            due_date TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_action_items_memory_id ON action_items(memory_id);

        CREATE TABLE IF NOT EXISTS external_references (
            id TEXT PRIMARY KEY,
            memory_id TEXT NOT NULL,
            reference_type TEXT NOT NULL,
            value TEXT NOT NULL,
            context TEXT,
            is_valid INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_external_references_memory_id ON external_references(memory_id);

        CREATE TABLE IF NOT EXISTS conversation_links (
            source_conversation_id TEXT NOT NULL,
            target_conversation_id TEXT NOT NULL,
            link_type TEXT NOT NULL,
            context TEXT,
            PRIMARY KEY (source_conversation_id, target_conversation_id)
        );

        -- Deployment-wide metadata key-value store (e.g. embedding dimensions).
        CREATE TABLE IF NOT EXISTS recall_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .await?;

    create_vector_indexes(conn).await?;

    Ok(())
}

async fn create_vector_indexes(conn: &Connection) -> Result<()> {
    for (index_name, table, column) in [
        ("memories_embedding_idx", "memories", "embedding"),
        ("attachments_embedding_idx", "attachments", "content_embedding"),
        ("entities_embedding_idx", "entities", "embedding"),
    ] {
        let exists: bool = conn
            .query(
                "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1",
                libsql::params![index_name],
            )
            .await?
            .next()
            .await?
            .is_some();

        if !exists {
            let sql = format!(
                "CREATE INDEX IF NOT EXISTS {index_name} ON {table}(libsql_vector_idx({column}))"
            );
            if let Err(e) = conn.execute(&sql, ()).await {
                tracing::warn!(index = index_name, error = %e, "vector index creation failed (may already exist)");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    #[tokio::test]
    async fn test_init_schema_creates_core_tables() {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();

        init_schema(&conn).await.unwrap();

        for table in [
            "tenants",
            "users",
            "memories",
            "memory_versions",
            "corrections",
            "attachments",
            "entities",
            "relations",
            "memory_entity_associations",
            "action_items",
            "external_references",
            "conversation_links",
            "recall_meta",
        ] {
            let exists: bool = conn
                .query(
                    "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
                    libsql::params![table],
                )
                .await
                .unwrap()
                .next()
                .await
                .unwrap()
                .is_some();
            assert!(exists, "expected table {table} to exist");
        }
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();

        init_schema(&conn).await.unwrap();
        init_schema(&conn).await.unwrap();
    }
}
