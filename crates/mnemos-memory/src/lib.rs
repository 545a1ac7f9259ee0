//! `mnemos-memory` – The Semantic Memory Store.
//!
//! Ingests text snippets, embeds them into fixed-size vectors and retrieves
//! the snippets most relevant to a new query by cosine similarity.
//!
//! # Modules
//!
//! - [`embedder`] – the [`Embedder`][embedder::Embedder] trait and the default
//!   [`CharFrequencyEmbedder`][embedder::CharFrequencyEmbedder].
//! - [`similarity`] – [`cosine_similarity`][similarity::cosine_similarity].
//! - [`store`] – [`EntryStore`][store::EntryStore]: identity, insertion order
//!   and the importance-based retention policy.
//! - [`query`] – filter → score → threshold → band-rank → truncate.
//! - [`context`] – renders search results into a prompt-ready context blob.
//! - [`snapshot`] – whole-collection JSON snapshots over a
//!   [`StorageBackend`][snapshot::StorageBackend] (in-memory or SQLite).
//! - [`semantic`] – [`SemanticMemory`][semantic::SemanticMemory], the facade
//!   callers hold.

pub mod context;
pub mod embedder;
pub mod query;
pub mod semantic;
pub mod similarity;
pub mod snapshot;
pub mod store;

pub use embedder::{CharFrequencyEmbedder, Embedder};
pub use semantic::{MemoryConfig, SemanticMemory};
pub use snapshot::{InMemoryBackend, SnapshotError, SnapshotStore, SqliteBackend, StorageBackend, StorageError};
pub use store::EntryStore;
