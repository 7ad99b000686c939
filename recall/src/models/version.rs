use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{ChangeType, Metadata};

/// Append-only snapshot per mutation (§3). `version_number` is monotonic per
/// memory starting at 1; `memory.current_version == MAX(version_number)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryVersion {
    pub memory_id: String,
    pub version_number: i64,
    pub content: String,
    pub title: Option<String>,
    pub tags: HashSet<String>,
    pub metadata: Metadata,
    pub changed_by: Option<String>,
    pub change_type: ChangeType,
    pub change_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A field-level diff between two versions, used by `compare` (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDiff {
    pub from_version: i64,
    pub to_version: i64,
    pub content_changed: bool,
    pub title_changed: bool,
    pub tags_added: Vec<String>,
    pub tags_removed: Vec<String>,
    pub metadata_changed: bool,
}

impl VersionDiff {
    pub fn compute(from: &MemoryVersion, to: &MemoryVersion) -> Self {
        let tags_added = to.tags.difference(&from.tags).cloned().collect();
        let tags_removed = from.tags.difference(&to.tags).cloned().collect();
        Self {
            from_version: from.version_number,
            to_version: to.version_number,
            content_changed: from.content != to.content,
            title_changed: from.title != to.title,
            tags_added,
            tags_removed,
            metadata_changed: from.metadata != to.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn version(n: i64, content: &str, tags: &[&str]) -> MemoryVersion {
        MemoryVersion {
            memory_id: "m1".into(),
            version_number: n,
            content: content.into(),
            title: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            metadata: HashMap::new(),
            changed_by: None,
            change_type: ChangeType::Update,
            change_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_compute_detects_content_change() {
        let from = version(1, "hello", &["a"]);
        let to = version(2, "goodbye", &["a"]);
        let diff = VersionDiff::compute(&from, &to);
        assert!(diff.content_changed);
        assert!(diff.tags_added.is_empty());
        assert!(diff.tags_removed.is_empty());
    }

    #[test]
    fn test_compute_detects_tag_changes() {
        let from = version(1, "hello", &["a", "b"]);
        let to = version(2, "hello", &["a", "c"]);
        let diff = VersionDiff::compute(&from, &to);
        assert!(!diff.content_changed);
        assert_eq!(diff.tags_added, vec!["c".to_string()]);
        assert_eq!(diff.tags_removed, vec!["b".to_string()]);
    }
}
