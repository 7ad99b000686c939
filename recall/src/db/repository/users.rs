use libsql::{params, Connection};

use crate::error::Result;
use crate::models::User;

pub struct UserRepository;

impl UserRepository {
    pub async fn create(conn: &Connection, user: &User) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO users (id, tenant_id, email, role, permissions, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user.id.clone(),
                user.tenant_id.clone(),
                user.email.clone(),
                user.role.clone(),
                serde_json::to_string(&user.permissions)?,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
        let mut rows = conn
            .query(
                "SELECT id, tenant_id, email, role, permissions, created_at, updated_at \
                 FROM users WHERE id = ?1",
                params![id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_user(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_by_email(conn: &Connection, tenant_id: &str, email: &str) -> Result<Option<User>> {
        let mut rows = conn
            .query(
                "SELECT id, tenant_id, email, role, permissions, created_at, updated_at \
                 FROM users WHERE tenant_id = ?1 AND email = ?2",
                params![tenant_id, email],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_user(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Deletes the user row. The caller (`UserStore`'s consumer) is
    /// responsible for nulling `memories.created_by` for this user first —
    /// that cascade lives in the Memory Service, not here, so it can be
    /// observed and logged at the aggregate boundary (§3).
    pub async fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let affected = conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .await?;
        Ok(affected > 0)
    }

    pub async fn null_created_by(conn: &Connection, user_id: &str) -> Result<u64> {
        conn.execute(
            "UPDATE memories SET created_by = NULL WHERE created_by = ?1",
            params![user_id],
        )
        .await
        .map_err(Into::into)
    }

    fn row_to_user(row: &libsql::Row) -> Result<User> {
        let permissions: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;
        Ok(User {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            email: row.get(2)?,
            role: row.get(3)?,
            permissions: serde_json::from_str(&permissions).unwrap_or_default(),
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
            updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
        })
    }
}
