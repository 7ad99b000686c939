use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{ConversationLink, ConversationLinkType};

pub struct ConversationLinkRepository;

impl ConversationLinkRepository {
    pub async fn create(conn: &Connection, link: &ConversationLink) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO conversation_links (source_conversation_id, target_conversation_id, link_type, context)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                link.source_conversation_id.clone(),
                link.target_conversation_id.clone(),
                link.link_type.to_string(),
                link.context.clone(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_for_conversation(conn: &Connection, conversation_id: &str) -> Result<Vec<ConversationLink>> {
        let mut rows = conn
            .query(
                "SELECT source_conversation_id, target_conversation_id, link_type, context \
                 FROM conversation_links WHERE source_conversation_id = ?1 OR target_conversation_id = ?1",
                params![conversation_id],
            )
            .await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_link(&row)?);
        }
        Ok(results)
    }

    fn row_to_link(row: &libsql::Row) -> Result<ConversationLink> {
        let link_type: String = row.get(2)?;
        Ok(ConversationLink {
            source_conversation_id: row.get(0)?,
            target_conversation_id: row.get(1)?,
            link_type: link_type.parse::<ConversationLinkType>().unwrap_or(ConversationLinkType::Related),
            context: row.get(3)?,
        })
    }
}
