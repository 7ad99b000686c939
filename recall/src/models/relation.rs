use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Metadata;

/// Unique on (from, to, relation_type); re-observation updates
/// `confidence = max(old, new)` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub relation_type: String,
    pub attributes: Metadata,
    pub confidence: f32,
    pub source_memory_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Relation {
    /// Normalizes a raw relation label to snake_case lowercase, matching the
    /// storage contract in §3.
    pub fn normalize_type(raw: &str) -> String {
        raw.trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect()
    }

    /// Re-observation confidence merge: `max(old, new)` (§3).
    pub fn merge_confidence(old: f32, new: f32) -> f32 {
        old.max(new)
    }
}

/// {memory_id, entity_id} join row with a relevance score (§3). Unique on
/// (memory_id, entity_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntityAssociation {
    pub memory_id: String,
    pub entity_id: String,
    pub relevance_score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_type_lowercases_and_snake_cases() {
        assert_eq!(Relation::normalize_type("Works At"), "works_at");
        assert_eq!(Relation::normalize_type("reports-to"), "reports_to");
    }

    #[test]
    fn test_normalize_type_strips_punctuation() {
        assert_eq!(Relation::normalize_type("co-founder!"), "co_founder");
    }

    #[test]
    fn test_merge_confidence_keeps_max() {
        assert_eq!(Relation::merge_confidence(0.4, 0.9), 0.9);
        assert_eq!(Relation::merge_confidence(0.9, 0.4), 0.9);
    }
}
