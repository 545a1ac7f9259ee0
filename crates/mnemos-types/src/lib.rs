use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Importance assigned when the caller does not supply one.
pub const DEFAULT_IMPORTANCE: u8 = 5;
/// Lowest accepted importance; smaller values are clamped up to it.
pub const MIN_IMPORTANCE: u8 = 1;
/// Highest accepted importance; larger values are clamped down to it.
pub const MAX_IMPORTANCE: u8 = 10;
/// Source label recorded when the caller does not identify itself.
pub const DEFAULT_SOURCE: &str = "unknown";
/// Default maximum number of results returned by a search.
pub const DEFAULT_QUERY_LIMIT: usize = 10;
/// Default minimum similarity a result must reach to be returned.
pub const DEFAULT_QUERY_THRESHOLD: f32 = 0.1;

/// Category of a stored memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// A turn of a chat or dialogue.
    Conversation,
    /// A standalone fact.
    Knowledge,
    /// Ambient context such as the page the user is looking at.
    #[default]
    Context,
    /// Something the user prefers or asked to be remembered about them.
    UserPreference,
}

impl MemoryType {
    /// All variants, in declaration order.
    pub const ALL: [MemoryType; 4] = [
        MemoryType::Conversation,
        MemoryType::Knowledge,
        MemoryType::Context,
        MemoryType::UserPreference,
    ];

    /// The persisted (snake_case) name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Conversation => "conversation",
            MemoryType::Knowledge => "knowledge",
            MemoryType::Context => "context",
            MemoryType::UserPreference => "user_preference",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = MnemosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        MemoryType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| MnemosError::UnknownMemoryType(s.to_string()))
    }
}

/// Descriptive data attached to every [`MemoryEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Free-form label of the caller or page that produced the entry.
    pub source: String,
    /// Creation time. Serialised as RFC-3339.
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<String>,
    /// Retention priority in `[1, 10]`.
    pub importance: u8,
}

/// Caller-supplied subset of [`MemoryMetadata`].
///
/// Unset fields fall back to `type = context`, `source = "unknown"`,
/// `tags = []` and `importance = 5` when the entry is created.
///
/// ```
/// use mnemos_types::{MemoryType, MetadataPatch};
///
/// let patch = MetadataPatch::new()
///     .with_type(MemoryType::Knowledge)
///     .with_importance(42);
/// let meta = patch.resolve(chrono::Utc::now());
/// assert_eq!(meta.memory_type, MemoryType::Knowledge);
/// assert_eq!(meta.importance, 10);
/// assert_eq!(meta.source, "unknown");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataPatch {
    #[serde(rename = "type")]
    pub memory_type: Option<MemoryType>,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
    pub importance: Option<u8>,
}

impl MetadataPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = Some(importance);
        self
    }

    /// Merge this patch over the defaults, stamping `timestamp` as the
    /// creation time. Importance is clamped to `[1, 10]`.
    pub fn resolve(self, timestamp: DateTime<Utc>) -> MemoryMetadata {
        MemoryMetadata {
            memory_type: self.memory_type.unwrap_or_default(),
            source: self.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            timestamp,
            tags: self.tags.unwrap_or_default(),
            importance: self
                .importance
                .unwrap_or(DEFAULT_IMPORTANCE)
                .clamp(MIN_IMPORTANCE, MAX_IMPORTANCE),
        }
    }
}

/// A single remembered text snippet together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique identifier, never reused.
    pub id: Uuid,
    /// The raw text snippet.
    pub content: String,
    pub metadata: MemoryMetadata,
    /// L2-normalised embedding derived from `content` at creation time.
    pub embedding: Vec<f32>,
}

impl MemoryEntry {
    /// Construct a new entry with a freshly generated UUID.
    pub fn new(content: String, metadata: MemoryMetadata, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            metadata,
            embedding,
        }
    }
}

/// Parameters of a single similarity search.
///
/// ```
/// use mnemos_types::{MemoryQuery, MemoryType};
///
/// let q = MemoryQuery::new("page X").with_type(MemoryType::Context).with_limit(5);
/// assert_eq!(q.limit, 5);
/// assert!((q.threshold - 0.1).abs() < f32::EPSILON);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryQuery {
    pub text: String,
    /// Keep only entries of this type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<MemoryType>,
    /// Keep only entries from this source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Maximum number of results.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum acceptable similarity.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

fn default_threshold() -> f32 {
    DEFAULT_QUERY_THRESHOLD
}

impl MemoryQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            memory_type: None,
            source: None,
            limit: DEFAULT_QUERY_LIMIT,
            threshold: DEFAULT_QUERY_THRESHOLD,
        }
    }

    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

/// One entry matched by a query, with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySearchResult {
    pub entry: MemoryEntry,
    pub similarity: f32,
}

/// Aggregate counts over the current store contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_entries: usize,
    pub by_type: BTreeMap<MemoryType, usize>,
    pub by_source: BTreeMap<String, usize>,
}

impl MemoryStats {
    /// Tally the given entries.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a MemoryEntry>,
    {
        let mut stats = MemoryStats::default();
        for entry in entries {
            stats.total_entries += 1;
            *stats.by_type.entry(entry.metadata.memory_type).or_default() += 1;
            *stats
                .by_source
                .entry(entry.metadata.source.clone())
                .or_default() += 1;
        }
        stats
    }
}

/// Errors raised while interpreting caller input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MnemosError {
    #[error("Unknown memory type: {0} (expected conversation, knowledge, context or user_preference)")]
    UnknownMemoryType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(memory_type: MemoryType, source: &str) -> MemoryEntry {
        let meta = MetadataPatch::new()
            .with_type(memory_type)
            .with_source(source)
            .resolve(Utc::now());
        MemoryEntry::new("x".to_string(), meta, vec![1.0])
    }

    #[test]
    fn patch_defaults_applied() {
        let ts = Utc::now();
        let meta = MetadataPatch::new().resolve(ts);
        assert_eq!(meta.memory_type, MemoryType::Context);
        assert_eq!(meta.source, DEFAULT_SOURCE);
        assert!(meta.tags.is_empty());
        assert_eq!(meta.importance, DEFAULT_IMPORTANCE);
        assert_eq!(meta.timestamp, ts);
    }

    #[test]
    fn patch_importance_clamped() {
        let low = MetadataPatch::new().with_importance(0).resolve(Utc::now());
        assert_eq!(low.importance, MIN_IMPORTANCE);
        let high = MetadataPatch::new().with_importance(200).resolve(Utc::now());
        assert_eq!(high.importance, MAX_IMPORTANCE);
    }

    #[test]
    fn patch_keeps_tag_order() {
        let meta = MetadataPatch::new()
            .with_tags(["b", "a", "c"])
            .resolve(Utc::now());
        assert_eq!(meta.tags, vec!["b", "a", "c"]);
    }

    #[test]
    fn memory_type_parse_and_display() {
        for t in MemoryType::ALL {
            assert_eq!(t.to_string().parse::<MemoryType>().unwrap(), t);
        }
        assert_eq!(
            "User-Preference".parse::<MemoryType>().unwrap(),
            MemoryType::UserPreference
        );
        let err = "gossip".parse::<MemoryType>().unwrap_err();
        assert_eq!(err, MnemosError::UnknownMemoryType("gossip".to_string()));
        assert!(err.to_string().contains("gossip"));
    }

    #[test]
    fn entry_json_uses_type_key_and_rfc3339_timestamp() {
        let e = entry(MemoryType::UserPreference, "settings");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["metadata"]["type"], "user_preference");
        let ts = json["metadata"]["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
        assert!(json["embedding"].is_array());
    }

    #[test]
    fn entry_roundtrip() {
        let e = entry(MemoryType::Knowledge, "wiki");
        let json = serde_json::to_string(&e).unwrap();
        let back: MemoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn entry_ids_are_unique() {
        let a = entry(MemoryType::Context, "a");
        let b = entry(MemoryType::Context, "a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn query_defaults_from_json() {
        let q: MemoryQuery = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(q, MemoryQuery::new("hello"));
        assert_eq!(q.limit, DEFAULT_QUERY_LIMIT);

        let q: MemoryQuery =
            serde_json::from_str(r#"{"text":"hi","type":"knowledge","limit":3}"#).unwrap();
        assert_eq!(q.memory_type, Some(MemoryType::Knowledge));
        assert_eq!(q.limit, 3);
    }

    #[test]
    fn stats_tally_by_type_and_source() {
        let entries = vec![
            entry(MemoryType::Context, "PageX"),
            entry(MemoryType::Context, "PageY"),
            entry(MemoryType::Knowledge, "PageX"),
        ];
        let stats = MemoryStats::from_entries(&entries);
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.by_type[&MemoryType::Context], 2);
        assert_eq!(stats.by_type[&MemoryType::Knowledge], 1);
        assert!(!stats.by_type.contains_key(&MemoryType::Conversation));
        assert_eq!(stats.by_source["PageX"], 2);
        assert_eq!(stats.by_source["PageY"], 1);
    }
}
