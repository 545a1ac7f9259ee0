//! Query Engine.
//!
//! Filters, scores, ranks and truncates stored entries for a
//! [`MemoryQuery`].
//!
//! ## Ranking
//!
//! Results are ordered by similarity, highest first, with a tolerance band:
//! scores within [`SIMILARITY_BAND`] of each other are treated as equal and
//! ordered by `importance` (highest first), then `timestamp` (most recent
//! first).
//!
//! Bands are formed greedily over the similarity-sorted list: each band is
//! anchored at its highest score and absorbs every following result that is
//! less than [`SIMILARITY_BAND`] below that anchor.  Within a band every pair
//! of scores therefore differs by less than the band width, and the ordering
//! stays a total order.

use std::cmp::Ordering;

use mnemos_types::{DEFAULT_QUERY_THRESHOLD, MemoryEntry, MemoryQuery, MemorySearchResult};

use crate::embedder::Embedder;
use crate::similarity::cosine_similarity;

/// Similarity differences smaller than this are treated as ties.
pub const SIMILARITY_BAND: f32 = 0.01;

/// Run `query` against `entries`, returning at most `query.limit` results.
///
/// An empty result is returned when nothing passes the filters and the
/// threshold; no input is treated as an error.
pub fn search(
    entries: &[MemoryEntry],
    embedder: &dyn Embedder,
    query: &MemoryQuery,
) -> Vec<MemorySearchResult> {
    if query.limit == 0 {
        return Vec::new();
    }
    let threshold = effective_threshold(query.threshold);
    let query_embedding = embedder.embed(&query.text);

    let mut scored: Vec<MemorySearchResult> = entries
        .iter()
        .filter(|e| {
            query
                .memory_type
                .is_none_or(|t| e.metadata.memory_type == t)
        })
        .filter(|e| {
            query
                .source
                .as_deref()
                .is_none_or(|s| e.metadata.source == s)
        })
        .filter_map(|e| {
            let similarity = cosine_similarity(&query_embedding, &e.embedding);
            (similarity >= threshold).then(|| MemorySearchResult {
                entry: e.clone(),
                similarity,
            })
        })
        .collect();

    rank(&mut scored);
    scored.truncate(query.limit);
    scored
}

/// Order `results` by similarity band, then importance, then recency.
pub fn rank(results: &mut [MemorySearchResult]) {
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    let mut start = 0;
    while start < results.len() {
        let anchor = results[start].similarity;
        let end = results[start..]
            .iter()
            .position(|r| anchor - r.similarity >= SIMILARITY_BAND)
            .map_or(results.len(), |offset| start + offset);
        results[start..end].sort_by(tie_break);
        start = end;
    }
}

fn tie_break(a: &MemorySearchResult, b: &MemorySearchResult) -> Ordering {
    let (a, b) = (&a.entry.metadata, &b.entry.metadata);
    b.importance
        .cmp(&a.importance)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
}

/// A NaN threshold falls back to the default.  Every other value, negative
/// ones included, is applied as given.
fn effective_threshold(threshold: f32) -> f32 {
    if !threshold.is_nan() {
        threshold
    } else {
        DEFAULT_QUERY_THRESHOLD
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
