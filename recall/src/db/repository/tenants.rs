use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{Tenant, TenantSettings};

pub struct TenantRepository;

impl TenantRepository {
    pub async fn create(conn: &Connection, tenant: &Tenant) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO tenants (id, slug, plan, max_memories, max_file_size_bytes, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                tenant.id.clone(),
                tenant.slug.clone(),
                tenant.plan.clone(),
                tenant.settings.max_memories,
                tenant.settings.max_file_size_bytes,
                "{}",
                tenant.created_at.to_rfc3339(),
                tenant.updated_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Tenant>> {
        let mut rows = conn
            .query(
                "SELECT id, slug, plan, max_memories, max_file_size_bytes, created_at, updated_at \
                 FROM tenants WHERE id = ?1",
                params![id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_tenant(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_by_slug(conn: &Connection, slug: &str) -> Result<Option<Tenant>> {
        let mut rows = conn
            .query(
                "SELECT id, slug, plan, max_memories, max_file_size_bytes, created_at, updated_at \
                 FROM tenants WHERE slug = ?1",
                params![slug],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_tenant(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn count_memories(conn: &Connection, tenant_id: &str) -> Result<i64> {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM memories WHERE tenant_id = ?1",
                params![tenant_id],
            )
            .await?;
        let row = rows.next().await?.expect("COUNT(*) always returns a row");
        Ok(row.get(0)?)
    }

    fn row_to_tenant(row: &libsql::Row) -> Result<Tenant> {
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;
        Ok(Tenant {
            id: row.get(0)?,
            slug: row.get(1)?,
            plan: row.get(2)?,
            settings: TenantSettings {
                max_memories: row.get(3)?,
                max_file_size_bytes: row.get(4)?,
            },
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
            updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
        })
    }
}
