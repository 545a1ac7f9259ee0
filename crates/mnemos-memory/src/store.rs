//! Entry Store.
//!
//! Owns the ordered collection of [`MemoryEntry`] records, assigns identity,
//! embeds content on insertion and enforces the capacity bound.
//!
//! # Retention policy
//!
//! When an insertion pushes the collection past `capacity`, only the
//! top-`capacity` entries survive, ranked by:
//!
//! 1. `importance`, highest first;
//! 2. `timestamp`, most recent first;
//! 3. insertion position, latest first.
//!
//! The ranking is a total order, so pruning is deterministic even when many
//! entries share the boundary importance.  Survivors keep their original
//! insertion order.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mnemos_memory::embedder::CharFrequencyEmbedder;
//! use mnemos_memory::store::EntryStore;
//! use mnemos_types::MetadataPatch;
//!
//! let mut store = EntryStore::new(2, Arc::new(CharFrequencyEmbedder::default()));
//! store.add("keep me", MetadataPatch::new().with_importance(9));
//! store.add("me too", MetadataPatch::new().with_importance(8));
//! store.add("drop me", MetadataPatch::new().with_importance(1));
//!
//! let contents: Vec<_> = store.entries().iter().map(|e| e.content.as_str()).collect();
//! assert_eq!(contents, vec!["keep me", "me too"]);
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use mnemos_types::{MemoryEntry, MetadataPatch};
use tracing::debug;
use uuid::Uuid;

use crate::embedder::Embedder;

/// Default maximum number of entries held by a store.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Capacity-bounded, insertion-ordered collection of memory entries.
pub struct EntryStore {
    entries: Vec<MemoryEntry>,
    capacity: usize,
    embedder: Arc<dyn Embedder>,
}

impl EntryStore {
    /// Create an empty store.  A `capacity` of zero is raised to one.
    pub fn new(capacity: usize, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
            embedder,
        }
    }

    /// Create a store pre-populated with `entries` (e.g. a loaded snapshot).
    ///
    /// The retention policy is applied immediately if `entries` exceeds the
    /// capacity.
    pub fn with_entries(
        capacity: usize,
        embedder: Arc<dyn Embedder>,
        entries: Vec<MemoryEntry>,
    ) -> Self {
        let mut store = Self::new(capacity, embedder);
        store.entries = entries;
        store.prune();
        store
    }

    /// Embed `content`, stamp it with a fresh id and the current time, merge
    /// `patch` over the default metadata and append it.
    ///
    /// Returns the new entry's id.  The entry itself may already have been
    /// pruned if the store was full of more important entries.
    pub fn add(&mut self, content: impl Into<String>, patch: MetadataPatch) -> Uuid {
        let content = content.into();
        let embedding = self.embedder.embed(&content);
        let metadata = patch.resolve(Utc::now());
        let entry = MemoryEntry::new(content, metadata, embedding);
        let id = entry.id;
        debug!(id = %id, importance = entry.metadata.importance, "memory entry added");
        self.entries.push(entry);
        self.prune();
        id
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    /// Look up an entry by id.
    pub fn get(&self, id: &Uuid) -> Option<&MemoryEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The embedder used for every entry in this store.
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Apply the retention policy.  Returns the number of entries dropped.
    fn prune(&mut self) -> usize {
        let excess = self.entries.len().saturating_sub(self.capacity);
        if excess == 0 {
            return 0;
        }

        let mut ranked: Vec<usize> = (0..self.entries.len()).collect();
        ranked.sort_by(|&a, &b| retention_order(&self.entries[a], a, &self.entries[b], b));

        let mut keep = vec![false; self.entries.len()];
        for &i in &ranked[..self.capacity] {
            keep[i] = true;
        }
        let mut position = 0;
        self.entries.retain(|_| {
            let kept = keep[position];
            position += 1;
            kept
        });

        debug!(dropped = excess, capacity = self.capacity, "retention policy pruned entries");
        excess
    }
}

/// Ordering used by the retention policy: entries that sort first survive.
fn retention_order(a: &MemoryEntry, a_pos: usize, b: &MemoryEntry, b_pos: usize) -> Ordering {
    b.metadata
        .importance
        .cmp(&a.metadata.importance)
        .then_with(|| b.metadata.timestamp.cmp(&a.metadata.timestamp))
        .then_with(|| b_pos.cmp(&a_pos))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
