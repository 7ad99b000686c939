use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{Metadata, Visibility};

pub const MAX_CONTENT_CHARS: usize = 50_000;
pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_TAGS: usize = 50;
pub const MAX_TAG_CHARS: usize = 50;

/// The root aggregate (§3). `embedding` is absent until the Embedder fills it
/// in; once written it always has length exactly `D` for the deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub tenant_id: String,
    pub created_by: Option<String>,
    pub content: String,
    pub title: Option<String>,
    pub tags: HashSet<String>,
    pub metadata: Metadata,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub current_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    pub fn new(id: String, tenant_id: String, created_by: Option<String>, content: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            tenant_id,
            created_by,
            content,
            title: None,
            tags: HashSet::new(),
            metadata: Metadata::new(),
            visibility: Visibility::default(),
            embedding: None,
            current_version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates the invariants that every write path must uphold
    /// (§3: content non-empty and bounded, tags unique and bounded).
    pub fn validate(&self) -> Result<(), String> {
        if self.content.trim().is_empty() {
            return Err("content must not be empty".to_string());
        }
        if self.content.chars().count() > MAX_CONTENT_CHARS {
            return Err(format!("content exceeds {MAX_CONTENT_CHARS} characters"));
        }
        if let Some(title) = &self.title {
            if title.chars().count() > MAX_TITLE_CHARS {
                return Err(format!("title exceeds {MAX_TITLE_CHARS} characters"));
            }
        }
        if self.tags.len() > MAX_TAGS {
            return Err(format!("memory has more than {MAX_TAGS} tags"));
        }
        for tag in &self.tags {
            if tag.chars().count() > MAX_TAG_CHARS {
                return Err(format!("tag '{tag}' exceeds {MAX_TAG_CHARS} characters"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateMemoryRequest {
    pub content: String,
    pub title: Option<String>,
    #[serde(default)]
    pub tags: HashSet<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateMemoryRequest {
    pub content: Option<String>,
    pub title: Option<String>,
    pub tags: Option<HashSet<String>>,
    pub metadata: Option<Metadata>,
    pub visibility: Option<Visibility>,
    pub change_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_content() {
        let memory = Memory::new("m1".into(), "t1".into(), None, "   ".into());
        assert!(memory.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_content() {
        let memory = Memory::new("m1".into(), "t1".into(), None, "a".repeat(MAX_CONTENT_CHARS + 1));
        assert!(memory.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_too_many_tags() {
        let mut memory = Memory::new("m1".into(), "t1".into(), None, "hello".into());
        for i in 0..(MAX_TAGS + 1) {
            memory.tags.insert(format!("tag{i}"));
        }
        assert!(memory.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed_memory() {
        let memory = Memory::new("m1".into(), "t1".into(), Some("u1".into()), "hello world".into());
        assert!(memory.validate().is_ok());
    }

    #[test]
    fn test_new_memory_starts_at_version_one() {
        let memory = Memory::new("m1".into(), "t1".into(), None, "hello".into());
        assert_eq!(memory.current_version, 1);
    }
}
