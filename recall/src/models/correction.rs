use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A human-applied correction layered over a memory's stored content (§3).
/// `effective_content` is never persisted on `Correction` itself — it is
/// derived by the caller as the latest correction's `corrected_content`,
/// falling back to the memory's own `content` when none exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub id: String,
    pub memory_id: String,
    pub corrected_content: String,
    pub original_content_snapshot: String,
    pub reason: Option<String>,
    pub corrected_by: Option<String>,
    pub corrected_at: DateTime<Utc>,
}

impl Correction {
    pub fn new(
        id: String,
        memory_id: String,
        corrected_content: String,
        original_content_snapshot: String,
        reason: Option<String>,
        corrected_by: Option<String>,
    ) -> Self {
        Self {
            id,
            memory_id,
            corrected_content,
            original_content_snapshot,
            reason,
            corrected_by,
            corrected_at: Utc::now(),
        }
    }
}

/// Resolves `effective_content` for a memory given its optional latest
/// correction (§3).
pub fn effective_content<'a>(memory_content: &'a str, latest_correction: Option<&'a Correction>) -> &'a str {
    latest_correction
        .map(|c| c.corrected_content.as_str())
        .unwrap_or(memory_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_content_falls_back_to_memory_content() {
        assert_eq!(effective_content("original", None), "original");
    }

    #[test]
    fn test_effective_content_prefers_latest_correction() {
        let correction = Correction::new(
            "c1".into(),
            "m1".into(),
            "fixed text".into(),
            "original".into(),
            Some("typo".into()),
            Some("u1".into()),
        );
        assert_eq!(effective_content("original", Some(&correction)), "fixed text");
    }
}
