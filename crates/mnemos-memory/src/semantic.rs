//! Semantic memory facade.
//!
//! [`SemanticMemory`] ties the embedder, entry store, query engine, context
//! assembler and snapshot persistence together behind one library API.  It
//! is an ordinary value: the composition root creates it (usually wrapped in
//! an `Arc`) and hands it to every caller that needs to remember or recall.
//!
//! ## Concurrency
//!
//! The entry collection sits behind a single [`tokio::sync::RwLock`].
//! [`add_memory`][SemanticMemory::add_memory] and
//! [`clear_memory`][SemanticMemory::clear_memory] hold the write lock for the
//! whole insert → prune → snapshot sequence, so a concurrent search never
//! observes a half-pruned collection and snapshots are written in mutation
//! order.  All read operations share the read lock.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mnemos_memory::semantic::{MemoryConfig, SemanticMemory};
//! use mnemos_memory::snapshot::InMemoryBackend;
//! use mnemos_types::{MemoryQuery, MemoryType, MetadataPatch};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let memory = SemanticMemory::open(Arc::new(InMemoryBackend::new()), MemoryConfig::default()).await;
//!
//! memory
//!     .add_memory(
//!         "User visited page X",
//!         MetadataPatch::new().with_type(MemoryType::Context).with_source("PageX"),
//!     )
//!     .await;
//!
//! let results = memory.search_memory(&MemoryQuery::new("page X").with_limit(5)).await;
//! assert_eq!(results.len(), 1);
//! assert!(results[0].similarity > 0.1);
//!
//! let context = memory.get_relevant_context("page X", None).await;
//! assert!(context.contains("[context] User visited page X"));
//! # }
//! ```

use std::sync::Arc;

use mnemos_types::{MemoryEntry, MemoryQuery, MemorySearchResult, MemoryStats, MetadataPatch};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::{context_query, format_context};
use crate::embedder::{CharFrequencyEmbedder, Embedder};
use crate::query;
use crate::snapshot::{DEFAULT_STORAGE_KEY, SnapshotStore, StorageBackend};
use crate::store::{DEFAULT_CAPACITY, EntryStore};

/// Tunables of a [`SemanticMemory`] instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of entries retained.
    pub capacity: usize,
    /// Storage key of the snapshot blob.
    pub storage_key: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

/// Retrieval-augmented memory store.
pub struct SemanticMemory {
    store: RwLock<EntryStore>,
    snapshot: SnapshotStore,
}

impl SemanticMemory {
    /// Open a store using the default character-frequency embedder, restoring
    /// any snapshot found in `backend`.
    pub async fn open(backend: Arc<dyn StorageBackend>, config: MemoryConfig) -> Self {
        Self::open_with_embedder(backend, config, Arc::new(CharFrequencyEmbedder::default())).await
    }

    /// Open a store with a custom embedder.
    ///
    /// Snapshot entries whose embedding length differs from
    /// `embedder.dimensions()` belong to another embedding space and are
    /// discarded on load.
    pub async fn open_with_embedder(
        backend: Arc<dyn StorageBackend>,
        config: MemoryConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let snapshot = SnapshotStore::new(backend, config.storage_key);
        let dims = embedder.dimensions();
        let (compatible, foreign): (Vec<MemoryEntry>, Vec<MemoryEntry>) = snapshot
            .load()
            .await
            .into_iter()
            .partition(|e| e.embedding.len() == dims);
        if !foreign.is_empty() {
            warn!(
                discarded = foreign.len(),
                expected_dims = dims,
                "snapshot entries with incompatible embeddings discarded"
            );
        }

        let store = EntryStore::with_entries(config.capacity, embedder, compatible);
        info!(
            key = %snapshot.key(),
            entries = store.len(),
            capacity = store.capacity(),
            "semantic memory opened"
        );
        Self {
            store: RwLock::new(store),
            snapshot,
        }
    }

    /// Remember `content` with the given metadata and persist the snapshot.
    ///
    /// Returns the id assigned to the new entry.
    pub async fn add_memory(&self, content: impl Into<String>, metadata: MetadataPatch) -> Uuid {
        let mut store = self.store.write().await;
        let id = store.add(content, metadata);
        self.snapshot.save(store.entries()).await;
        id
    }

    /// Rank stored entries against `query`.
    pub async fn search_memory(&self, query: &MemoryQuery) -> Vec<MemorySearchResult> {
        let store = self.store.read().await;
        query::search(store.entries(), store.embedder(), query)
    }

    /// Top five matches for `query`, optionally restricted to `source`,
    /// rendered as a context blob.
    pub async fn get_relevant_context(&self, query: &str, source: Option<&str>) -> String {
        let results = self.search_memory(&context_query(query, source)).await;
        format_context(&results)
    }

    /// Copy of every entry in insertion order.
    pub async fn list_entries(&self) -> Vec<MemoryEntry> {
        self.store.read().await.entries().to_vec()
    }

    pub async fn get_entry(&self, id: &Uuid) -> Option<MemoryEntry> {
        self.store.read().await.get(id).cloned()
    }

    /// Forget everything and persist the empty snapshot.
    pub async fn clear_memory(&self) {
        let mut store = self.store.write().await;
        let dropped = store.len();
        store.clear();
        self.snapshot.save(store.entries()).await;
        info!(dropped, "semantic memory cleared");
    }

    pub async fn get_stats(&self) -> MemoryStats {
        MemoryStats::from_entries(self.store.read().await.entries())
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// The persistence handle this store writes through.
    pub fn snapshot(&self) -> &SnapshotStore {
        &self.snapshot
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NO_CONTEXT;
    use crate::snapshot::{InMemoryBackend, StorageError};
    use async_trait::async_trait;
    use mnemos_types::MemoryType;

    /// Backend that rejects every read and write.
    struct UnavailableBackend;

    #[async_trait]
    impl StorageBackend for UnavailableBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Poisoned)
        }
        async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    async fn fresh() -> (Arc<InMemoryBackend>, SemanticMemory) {
        let backend = Arc::new(InMemoryBackend::new());
        let memory = SemanticMemory::open(backend.clone(), MemoryConfig::default()).await;
        (backend, memory)
    }

    #[tokio::test]
    async fn add_then_search_finds_entry() {
        let (_, memory) = fresh().await;
        memory
            .add_memory(
                "User visited page X",
                MetadataPatch::new()
                    .with_type(MemoryType::Context)
                    .with_source("PageX")
                    .with_importance(3),
            )
            .await;
        let results = memory
            .search_memory(&MemoryQuery::new("page X").with_limit(5))
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.content, "User visited page X");
        assert!(results[0].similarity > 0.1);
    }

    #[tokio::test]
    async fn type_filter_hides_knowledge_entry() {
        let (_, memory) = fresh().await;
        memory
            .add_memory("Alpha", MetadataPatch::new().with_type(MemoryType::Knowledge))
            .await;
        memory
            .add_memory("Beta", MetadataPatch::new().with_type(MemoryType::Conversation))
            .await;
        let results = memory
            .search_memory(&MemoryQuery::new("Alpha").with_type(MemoryType::Conversation))
            .await;
        assert!(results.iter().all(|r| r.entry.content != "Alpha"));
    }

    #[tokio::test]
    async fn empty_store_context_is_sentinel() {
        let (_, memory) = fresh().await;
        assert_eq!(memory.get_relevant_context("anything", None).await, NO_CONTEXT);
    }

    #[tokio::test]
    async fn context_respects_source_and_limit() {
        let (_, memory) = fresh().await;
        for i in 0..8 {
            memory
                .add_memory(format!("note number {i}"), MetadataPatch::new().with_source("A"))
                .await;
        }
        memory
            .add_memory("note number 9", MetadataPatch::new().with_source("B"))
            .await;

        let ctx = memory.get_relevant_context("note number", Some("A")).await;
        let lines: Vec<_> = ctx.lines().collect();
        assert_eq!(lines[0], crate::context::CONTEXT_HEADER);
        assert_eq!(lines.len(), 6);
        assert!(!ctx.contains("note number 9"));
    }

    #[tokio::test]
    async fn list_entries_is_idempotent() {
        let (_, memory) = fresh().await;
        memory.add_memory("one", MetadataPatch::new()).await;
        memory.add_memory("two", MetadataPatch::new()).await;
        assert_eq!(memory.list_entries().await, memory.list_entries().await);
    }

    #[tokio::test]
    async fn clear_then_restart_is_empty() {
        let (backend, memory) = fresh().await;
        memory.add_memory("something", MetadataPatch::new()).await;
        memory.clear_memory().await;
        assert!(memory.list_entries().await.is_empty());
        assert!(memory.snapshot().load().await.is_empty());

        let restarted = SemanticMemory::open(backend, MemoryConfig::default()).await;
        assert!(restarted.is_empty().await);
    }

    #[tokio::test]
    async fn restart_restores_entries() {
        let (backend, memory) = fresh().await;
        memory
            .add_memory("Prefers tea", MetadataPatch::new().with_type(MemoryType::UserPreference))
            .await;
        memory.add_memory("Saw page Y", MetadataPatch::new()).await;

        let restarted = SemanticMemory::open(backend, MemoryConfig::default()).await;
        assert_eq!(restarted.list_entries().await, memory.list_entries().await);
    }

    #[tokio::test]
    async fn restart_with_smaller_capacity_prunes() {
        let (backend, memory) = fresh().await;
        for i in 1..=5u8 {
            memory
                .add_memory(format!("entry {i}"), MetadataPatch::new().with_importance(i))
                .await;
        }
        let config = MemoryConfig {
            capacity: 2,
            ..MemoryConfig::default()
        };
        let restarted = SemanticMemory::open(backend, config).await;
        let kept: Vec<u8> = restarted
            .list_entries()
            .await
            .iter()
            .map(|e| e.metadata.importance)
            .collect();
        assert_eq!(kept, vec![4, 5]);
    }

    #[tokio::test]
    async fn incompatible_snapshot_entries_are_discarded() {
        let (backend, memory) = fresh().await;
        memory.add_memory("abc", MetadataPatch::new()).await;

        let restarted = SemanticMemory::open_with_embedder(
            backend,
            MemoryConfig::default(),
            Arc::new(CharFrequencyEmbedder::new("abc")),
        )
        .await;
        assert!(restarted.is_empty().await);
    }

    #[tokio::test]
    async fn custom_storage_key_is_used() {
        let backend = Arc::new(InMemoryBackend::new());
        let config = MemoryConfig {
            storage_key: "other".to_string(),
            ..MemoryConfig::default()
        };
        let memory = SemanticMemory::open(backend.clone(), config).await;
        memory.add_memory("x", MetadataPatch::new()).await;
        assert!(backend.get("other").await.unwrap().is_some());
        assert!(backend.get(DEFAULT_STORAGE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_count_by_type_and_source() {
        let (_, memory) = fresh().await;
        memory
            .add_memory("a", MetadataPatch::new().with_type(MemoryType::Knowledge).with_source("wiki"))
            .await;
        memory
            .add_memory("b", MetadataPatch::new().with_type(MemoryType::Knowledge).with_source("chat"))
            .await;
        memory.add_memory("c", MetadataPatch::new()).await;

        let stats = memory.get_stats().await;
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.by_type[&MemoryType::Knowledge], 2);
        assert_eq!(stats.by_type[&MemoryType::Context], 1);
        assert_eq!(stats.by_source["unknown"], 1);
    }

    #[tokio::test]
    async fn get_entry_by_id() {
        let (_, memory) = fresh().await;
        let id = memory.add_memory("findable", MetadataPatch::new()).await;
        assert_eq!(memory.get_entry(&id).await.unwrap().content, "findable");
        assert!(memory.get_entry(&Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn unavailable_backend_does_not_interrupt_operations() {
        let memory = SemanticMemory::open(Arc::new(UnavailableBackend), MemoryConfig::default()).await;
        assert!(memory.is_empty().await);

        let id = memory
            .add_memory("User visited page X", MetadataPatch::new().with_source("PageX"))
            .await;
        assert!(memory.get_entry(&id).await.is_some());
        let results = memory
            .search_memory(&MemoryQuery::new("page X").with_limit(5))
            .await;
        assert_eq!(results.len(), 1);
        assert!(memory
            .get_relevant_context("page X", None)
            .await
            .contains("User visited page X"));

        memory.clear_memory().await;
        assert!(memory.list_entries().await.is_empty());
        assert!(memory.search_memory(&MemoryQuery::new("page X")).await.is_empty());
    }

        #[tokio::test]
    async fn concurrent_adds_are_all_recorded() {
        let memory = Arc::new(
            SemanticMemory::open(Arc::new(InMemoryBackend::new()), MemoryConfig::default()).await,
        );
        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let m = memory.clone();
                tokio::spawn(async move { m.add_memory(format!("task {i}"), MetadataPatch::new()).await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(memory.len().await, 20);
        assert_eq!(memory.snapshot().load().await.len(), 20);
    }
}
