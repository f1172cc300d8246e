//! Embedding provider and the asymmetric passage/query framing.
//!
//! The embedding model is asymmetric: stored content and search queries are
//! encoded under different textual framings, and mixing them up silently
//! degrades retrieval. [`FramedEmbedder`] is the only entry point the rest of
//! the pipeline uses, so the framing contract cannot be bypassed.

const PASSAGE_PREFIX: &str = "passage: ";
const QUERY_PREFIX: &str = "query: ";

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 256;

/// A text-to-vector model with a fixed output dimensionality.
pub trait Embedder {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Offline deterministic embedder: FNV-1a-hashed character trigrams bucketed
/// into a fixed-dimension vector, L2-normalized.
#[derive(Debug, Clone, Copy)]
pub struct HashedNgramEmbedder {
    dimensions: usize,
}

impl HashedNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for HashedNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

impl Embedder for HashedNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        for window in chars.windows(3) {
            let bucket = (fnv1a(window) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        vector
    }
}

fn fnv1a(window: &[char]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for ch in window {
        let mut buf = [0u8; 4];
        for byte in ch.encode_utf8(&mut buf).as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}

/// Applies the passage/query framing before delegating to the inner model.
#[derive(Debug, Clone, Copy)]
pub struct FramedEmbedder<E: Embedder> {
    inner: E,
}

impl<E: Embedder> FramedEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    pub fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    /// Encode stored content under the passage framing.
    pub fn embed_passages(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|text| self.inner.embed(&format!("{PASSAGE_PREFIX}{text}")))
            .collect()
    }

    /// Encode a search query under the query framing.
    pub fn embed_query(&self, text: &str) -> Vec<f32> {
        self.inner.embed(&format!("{QUERY_PREFIX}{text}"))
    }
}
