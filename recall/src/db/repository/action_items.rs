use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{ActionItem, ActionItemStatus};

pub struct ActionItemRepository;

impl ActionItemRepository {
    pub async fn create(conn: &Connection, item: &ActionItem) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO action_items (id, memory_id, text, status, priority, due_date, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                item.id.clone(),
                item.memory_id.clone(),
                item.text.clone(),
                item.status.to_string(),
                item.priority.clone(),
                item.due_date.map(|d| d.to_rfc3339()),
                item.created_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_by_memory(conn: &Connection, memory_id: &str) -> Result<Vec<ActionItem>> {
        let mut rows = conn
            .query(
                &format!("{} WHERE memory_id = ?1 ORDER BY created_at ASC", Self::select_clause()),
                params![memory_id],
            )
            .await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_item(&row)?);
        }
        Ok(results)
    }

    pub async fn update(conn: &Connection, item: &ActionItem) -> Result<()> {
        conn.execute(
            "UPDATE action_items SET status = ?2, priority = ?3, due_date = ?4 WHERE id = ?1",
            params![
                item.id.clone(),
                item.status.to_string(),
                item.priority.clone(),
                item.due_date.map(|d| d.to_rfc3339()),
            ],
        )
        .await?;
        Ok(())
    }

    fn select_clause() -> &'static str {
        "SELECT id, memory_id, text, status, priority, due_date, created_at FROM action_items"
    }

    fn row_to_item(row: &libsql::Row) -> Result<ActionItem> {
        let status: String = row.get(3)?;
        let due_date: Option<String> = row.get(5)?;
        let created_at: String = row.get(6)?;
        Ok(ActionItem {
            id: row.get(0)?,
            memory_id: row.get(1)?,
            text: row.get(2)?,
            status: status.parse::<ActionItemStatus>().unwrap_or_default(),
            priority: row.get(4)?,
            due_date: due_date.and_then(|d| DateTime::parse_from_rfc3339(&d).ok()).map(|d| d.with_timezone(&Utc)),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
