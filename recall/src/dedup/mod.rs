//! Deduplication (§4.4). `find_duplicate` is a pure read over a
//! tenant/user/time-windowed candidate set; `merge_content`/`merge_tags` are
//! pure functions the caller (`services/memory.rs`, once rewritten) applies
//! and then persists as a new `MemoryVersion` — this module never writes to
//! the store itself, matching `graph::neighborhood`'s read-only shape and
//! leaving the single-transaction mutation discipline (§5) to the service
//! layer.

use std::collections::HashSet;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::db::DatabaseBackend;
use crate::error::Result;
use crate::models::{MergeStrategy, Memory};

const AUTO_MERGE_TAG: &str = "auto-merge";
const AUTO_MERGE_APPEND_TAG: &str = "auto-merge-append";

#[derive(Debug, Clone)]
pub enum DuplicateMatch {
    /// Same normalized-content fingerprint within the window.
    Exact { existing: Memory },
    /// Trigram similarity ≥ the configured near-duplicate threshold.
    Near { existing: Memory, similarity: f32 },
}

impl DuplicateMatch {
    pub fn existing(&self) -> &Memory {
        match self {
            Self::Exact { existing } => existing,
            Self::Near { existing, .. } => existing,
        }
    }

    pub fn similarity(&self) -> f32 {
        match self {
            Self::Exact { .. } => 1.0,
            Self::Near { similarity, .. } => *similarity,
        }
    }
}

/// Checks `content` against the tenant/user's recent memories (§4.4 steps
/// 1-4). `created_by` narrows the window to the same author when present,
/// matching `create_with_dedup`'s per-author scoping; `None` checks across
/// the whole tenant.
pub async fn find_duplicate(
    db: &dyn DatabaseBackend,
    tenant_id: &str,
    created_by: Option<&str>,
    content: &str,
    window_secs: u64,
    near_duplicate_threshold: f32,
) -> Result<Option<DuplicateMatch>> {
    let cutoff = Utc::now() - chrono::Duration::seconds(window_secs as i64);
    let candidates = db.recent_memories_for_dedup(tenant_id, cutoff).await?;

    let in_window: Vec<Memory> = candidates
        .into_iter()
        .filter(|candidate| created_by.map_or(true, |author| candidate.created_by.as_deref() == Some(author)))
        .collect();

    let target_fingerprint = fingerprint(content);
    let mut best: Option<(Memory, f32)> = None;

    for candidate in in_window {
        if fingerprint(&candidate.content) == target_fingerprint {
            return Ok(Some(DuplicateMatch::Exact { existing: candidate }));
        }

        let similarity = trigram_similarity(content, &candidate.content);
        if best.as_ref().map_or(true, |(_, best_similarity)| similarity > *best_similarity) {
            best = Some((candidate, similarity));
        }
    }

    match best {
        Some((existing, similarity)) if similarity >= near_duplicate_threshold => {
            Ok(Some(DuplicateMatch::Near { existing, similarity }))
        }
        _ => Ok(None),
    }
}

/// Stable content fingerprint: case-folded, whitespace-collapsed,
/// punctuation-stripped, then hashed so equality is a cheap string compare
/// regardless of content length.
pub fn fingerprint(content: &str) -> String {
    let normalized = normalize_content(content);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_content(content: &str) -> String {
    let folded: String = content
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard similarity over character trigram sets of the normalized content.
/// Mirrors what a SQL `trigram_sim` index would compute, done in Rust because
/// libsql has no trigram index type (same deviation already accepted for
/// keyword search).
pub fn trigram_similarity(a: &str, b: &str) -> f32 {
    let trigrams_a = trigrams(&normalize_content(a));
    let trigrams_b = trigrams(&normalize_content(b));

    if trigrams_a.is_empty() || trigrams_b.is_empty() {
        return 0.0;
    }

    let intersection = trigrams_a.intersection(&trigrams_b).count();
    let union = trigrams_a.union(&trigrams_b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

fn trigrams(s: &str) -> HashSet<[char; 3]> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < 3 {
        return HashSet::new();
    }
    chars.windows(3).map(|w| [w[0], w[1], w[2]]).collect()
}

/// `auto-merge`/`auto-merge-append` tags bypass the dedup warning entirely
/// and are always merged with `append`, regardless of the caller-requested
/// strategy (§4.4).
pub fn auto_merge_strategy(tags: &HashSet<String>) -> Option<MergeStrategy> {
    if tags.contains(AUTO_MERGE_TAG) || tags.contains(AUTO_MERGE_APPEND_TAG) {
        Some(MergeStrategy::Append)
    } else {
        None
    }
}

/// Merges `existing` content with `incoming` per `strategy` (§4.4). `smart`
/// keeps whichever side is a superset of the other; when neither contains
/// the other it falls back to `append` so merging never silently drops text.
pub fn merge_content(existing: &str, incoming: &str, strategy: MergeStrategy) -> String {
    match strategy {
        MergeStrategy::Replace => incoming.to_string(),
        MergeStrategy::Append => append_content(existing, incoming),
        MergeStrategy::Smart => {
            if existing.contains(incoming) {
                existing.to_string()
            } else if incoming.contains(existing) {
                incoming.to_string()
            } else {
                append_content(existing, incoming)
            }
        }
    }
}

fn append_content(existing: &str, incoming: &str) -> String {
    format!("{existing}\n\n---\n\n{incoming}")
}

/// Tag union applied for every merge strategy (§4.4: "merge tag sets" is
/// common to `smart`/`append`/`replace`).
pub fn merge_tags(existing: &HashSet<String>, incoming: Option<&HashSet<String>>) -> HashSet<String> {
    let mut merged = existing.clone();
    if let Some(incoming) = incoming {
        merged.extend(incoming.iter().cloned());
    }
    merged
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{Database, LibSqlBackend};

    fn test_config() -> DatabaseConfig {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let thread_id = std::thread::current().id();
        DatabaseConfig {
            url: format!("file:/tmp/recall_dedup_test_{thread_id:?}_{timestamp}?mode=memory&cache=shared"),
            auth_token: None,
            local_path: None,
            busy_timeout_ms: 5000,
            journal_mode: "WAL".into(),
            synchronous: "NORMAL".into(),
            pool_min: 1,
            pool_max: 4,
            acquire_retries: 3,
        }
    }

    async fn test_backend() -> Arc<dyn DatabaseBackend> {
        let db = Database::new(&test_config()).await.expect("failed to create database");
        Arc::new(LibSqlBackend::new(db))
    }

    #[test]
    fn normalize_content_folds_case_and_collapses_whitespace() {
        assert_eq!(normalize_content("Hello,   World!!"), "hello world");
    }

    #[test]
    fn fingerprint_is_stable_across_punctuation_and_case() {
        assert_eq!(fingerprint("Hello, World!"), fingerprint("hello world"));
        assert_ne!(fingerprint("Hello, World!"), fingerprint("Goodbye, World!"));
    }

    #[test]
    fn trigram_similarity_is_one_for_identical_normalized_content() {
        assert_eq!(trigram_similarity("ship it today", "Ship It Today!"), 1.0);
    }

    #[test]
    fn trigram_similarity_is_zero_for_unrelated_content() {
        let similarity = trigram_similarity("quarterly revenue report", "cat photo collection");
        assert!(similarity < 0.2);
    }

    #[test]
    fn auto_merge_strategy_detects_either_tag() {
        let tagged: HashSet<String> = ["auto-merge".to_string()].into_iter().collect();
        assert_eq!(auto_merge_strategy(&tagged), Some(MergeStrategy::Append));

        let untagged: HashSet<String> = ["other".to_string()].into_iter().collect();
        assert_eq!(auto_merge_strategy(&untagged), None);
    }

    #[test]
    fn merge_content_smart_keeps_the_superset() {
        let merged = merge_content("the quick fox", "the quick fox jumps", MergeStrategy::Smart);
        assert_eq!(merged, "the quick fox jumps");
    }

    #[test]
    fn merge_content_smart_falls_back_to_append_when_disjoint() {
        let merged = merge_content("alpha", "beta", MergeStrategy::Smart);
        assert_eq!(merged, "alpha\n\n---\n\nbeta");
    }

    #[test]
    fn merge_content_replace_overwrites() {
        assert_eq!(merge_content("old", "new", MergeStrategy::Replace), "new");
    }

    #[test]
    fn merge_tags_unions_both_sets() {
        let existing: HashSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();
        let incoming: HashSet<String> = ["b".to_string(), "c".to_string()].into_iter().collect();
        let merged = merge_tags(&existing, Some(&incoming));
        assert_eq!(merged, ["a", "b", "c"].into_iter().map(String::from).collect());
    }

    #[tokio::test]
    async fn find_duplicate_detects_exact_match_within_window() {
        let db = test_backend().await;
        let memory = Memory::new("m1".into(), "t1".into(), Some("u1".into()), "Ship the release today".into());
        db.create_memory(&memory).await.expect("create should succeed");

        let found = find_duplicate(&*db, "t1", Some("u1"), "ship the release today!!", 300, 0.9)
            .await
            .expect("should not error")
            .expect("duplicate should be found");

        assert_eq!(found.similarity(), 1.0);
        assert_eq!(found.existing().id, "m1");
    }

    #[tokio::test]
    async fn find_duplicate_ignores_rows_outside_the_author_scope() {
        let db = test_backend().await;
        let memory = Memory::new("m1".into(), "t1".into(), Some("u1".into()), "Ship the release today".into());
        db.create_memory(&memory).await.expect("create should succeed");

        let found = find_duplicate(&*db, "t1", Some("u2"), "Ship the release today", 300, 0.9)
            .await
            .expect("should not error");

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn find_duplicate_returns_none_for_unrelated_content() {
        let db = test_backend().await;
        let memory = Memory::new("m1".into(), "t1".into(), Some("u1".into()), "Ship the release today".into());
        db.create_memory(&memory).await.expect("create should succeed");

        let found = find_duplicate(&*db, "t1", Some("u1"), "Buy milk and eggs", 300, 0.9)
            .await
            .expect("should not error");

        assert!(found.is_none());
    }
}
