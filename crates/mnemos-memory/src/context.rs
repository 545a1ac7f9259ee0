//! Context Assembler – renders search results into a prompt-ready text blob.

use mnemos_types::{DEFAULT_QUERY_THRESHOLD, MemoryQuery, MemorySearchResult};

/// Returned when a context lookup finds nothing.
pub const NO_CONTEXT: &str = "No relevant context found in memory.";
/// First line of every non-empty context blob.
pub const CONTEXT_HEADER: &str = "Relevant context from memory:";
/// Number of results included in a context blob.
pub const CONTEXT_LIMIT: usize = 5;

/// Build the query used for context lookups: no type filter, an optional
/// source filter, `limit = 5` and `threshold = 0.1`.
pub fn context_query(text: &str, source: Option<&str>) -> MemoryQuery {
    let query = MemoryQuery::new(text)
        .with_limit(CONTEXT_LIMIT)
        .with_threshold(DEFAULT_QUERY_THRESHOLD);
    match source {
        Some(s) => query.with_source(s),
        None => query,
    }
}

/// Format `results` in the order given, one line each:
///
/// ```text
/// Relevant context from memory:
/// [knowledge] Rust has no GC (similarity: 87.3%)
/// ```
pub fn format_context(results: &[MemorySearchResult]) -> String {
    if results.is_empty() {
        return NO_CONTEXT.to_string();
    }
    let mut out = String::from(CONTEXT_HEADER);
    for r in results {
        out.push('\n');
        out.push_str(&format!(
            "[{}] {} (similarity: {:.1}%)",
            r.entry.metadata.memory_type,
            r.entry.content,
            r.similarity * 100.0
        ));
    }
    out
}
