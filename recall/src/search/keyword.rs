//! Keyword-mode ranking (§4.5): `GREATEST(trigram_sim(content, q),
//! trigram_sim(title, q))`, tie-broken by `created_at DESC`. libsql has no
//! trigram index type, so this runs over a tenant-scoped candidate pool
//! already fetched from the store, mirroring the deviation `dedup/mod.rs`
//! already takes for its own duplicate-candidate scoring.

use crate::dedup::trigram_similarity;
use crate::models::Memory;

/// Scores and sorts `candidates` against `query`, dropping zero-similarity
/// rows. Ties fall back to `created_at DESC`.
pub fn rank(candidates: Vec<Memory>, query: &str) -> Vec<(Memory, f32)> {
    let mut scored: Vec<(Memory, f32)> = candidates
        .into_iter()
        .filter_map(|memory| {
            let content_sim = trigram_similarity(query, &memory.content);
            let title_sim = memory
                .title
                .as_deref()
                .map(|title| trigram_similarity(query, title))
                .unwrap_or(0.0);
            let score = content_sim.max(title_sim);
            (score > 0.0).then_some((memory, score))
        })
        .collect();

    scored.sort_by(|(a, a_score), (b, b_score)| {
        b_score
            .partial_cmp(a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    scored
}
