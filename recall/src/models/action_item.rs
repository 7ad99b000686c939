use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ActionItemStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub memory_id: String,
    pub text: String,
    pub status: ActionItemStatus,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ActionItem {
    pub fn new(id: String, memory_id: String, text: String) -> Self {
        Self {
            id,
            memory_id,
            text,
            status: ActionItemStatus::default(),
            priority: None,
            due_date: None,
            created_at: Utc::now(),
        }
    }
}
