//! Text → vector embedding.
//!
//! Every stored entry and every query passes through an [`Embedder`] before
//! it can be compared.  The store and the query engine only see the trait, so
//! the default [`CharFrequencyEmbedder`] can be swapped for a learned model
//! without touching either.
//!
//! # Character-frequency model
//!
//! [`CharFrequencyEmbedder`] counts how often each symbol of a fixed alphabet
//! occurs in the lower-cased text and L2-normalises the counts:
//!
//! ```text
//! v[i] = count(alphabet[i]) / ‖count‖₂
//! ```
//!
//! Characters outside the alphabet are ignored.  Text without a single
//! alphabet character yields the zero vector.
//!
//! # Example
//!
//! ```rust
//! use mnemos_memory::embedder::{CharFrequencyEmbedder, Embedder};
//!
//! let embedder = CharFrequencyEmbedder::default();
//! let v = embedder.embed("Hello, world");
//! assert_eq!(v.len(), 37);
//!
//! let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
//! assert!((norm - 1.0).abs() < 1e-5);
//!
//! assert!(embedder.embed("!!!").iter().all(|&x| x == 0.0));
//! ```

use std::collections::HashMap;

/// Lower-case letters, digits and space.
pub const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789 ";

/// Deterministic text → fixed-length vector mapping.
///
/// Implementations must return vectors of [`dimensions`][Self::dimensions]
/// length for every input and must not depend on external state.
pub trait Embedder: Send + Sync {
    /// Embed `text`.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Length of every vector produced by [`embed`][Self::embed].
    fn dimensions(&self) -> usize;
}

/// Character-frequency embedder over a fixed alphabet.
#[derive(Debug, Clone)]
pub struct CharFrequencyEmbedder {
    /// Symbol → dimension index.
    index: HashMap<char, usize>,
    dims: usize,
}

impl CharFrequencyEmbedder {
    /// Build an embedder over the distinct characters of `alphabet`, in order
    /// of first appearance.  Letters are lower-cased so that they can match
    /// the lower-cased input.
    pub fn new(alphabet: &str) -> Self {
        let mut index = HashMap::new();
        for c in alphabet.chars().flat_map(char::to_lowercase) {
            let next = index.len();
            index.entry(c).or_insert(next);
        }
        let dims = index.len();
        Self { index, dims }
    }
}

impl Default for CharFrequencyEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHABET)
    }
}

impl Embedder for CharFrequencyEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut counts = vec![0.0f32; self.dims];
        for c in text.chars().flat_map(char::to_lowercase) {
            if let Some(&i) = self.index.get(&c) {
                counts[i] += 1.0;
            }
        }
        normalize(&mut counts);
        counts
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Scale `v` to unit L2 norm in place.  A zero vector is left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn default_alphabet_has_37_dimensions() {
        let e = CharFrequencyEmbedder::default();
        assert_eq!(e.dimensions(), 37);
        assert_eq!(e.embed("abc").len(), 37);
    }

    #[test]
    fn non_empty_text_is_unit_length() {
        let e = CharFrequencyEmbedder::default();
        for text in ["a", "User visited page X", "  ", "Zebra 42 ZEBRA", "ünïcode abc"] {
            assert!((norm(&e.embed(text)) - 1.0).abs() < 1e-5, "text {text:?}");
        }
    }

    #[test]
    fn empty_and_foreign_text_yield_zero_vector() {
        let e = CharFrequencyEmbedder::default();
        assert!(e.embed("").iter().all(|&x| x == 0.0));
        assert!(e.embed("!?.,;—").iter().all(|&x| x == 0.0));
        assert_eq!(e.embed("").len(), 37);
    }

    #[test]
    fn case_insensitive() {
        let e = CharFrequencyEmbedder::default();
        assert_eq!(e.embed("Page X"), e.embed("page x"));
    }

    #[test]
    fn deterministic() {
        let e = CharFrequencyEmbedder::default();
        let a = e.embed("the quick brown fox 123");
        let b = e.embed("the quick brown fox 123");
        assert_eq!(a, b);
    }

    #[test]
    fn counts_are_proportional() {
        let e = CharFrequencyEmbedder::new("ab");
        let v = e.embed("aab");
        // counts [2, 1] / sqrt(5)
        let s = 5.0f32.sqrt();
        assert!((v[0] - 2.0 / s).abs() < 1e-6);
        assert!((v[1] - 1.0 / s).abs() < 1e-6);
    }

    #[test]
    fn custom_alphabet_deduplicates_and_lowercases() {
        let e = CharFrequencyEmbedder::new("AaBb");
        assert_eq!(e.dimensions(), 2);
        assert_eq!(e.embed("ab"), e.embed("BA"));
    }

    #[test]
    fn normalize_leaves_zero_vector() {
        let mut v = vec![0.0f32; 4];
        normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }
}
