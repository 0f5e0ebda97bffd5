//! Embedding abstraction
//!
//! Provides a unified interface for embedding providers and the
//! deterministic hash embedder used by the similarity index.
//!
//! The hash embedder carries no semantic meaning: identical text always
//! yields the identical vector and different texts yield independent ones.

use rand::{rngs::StdRng, Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Trait for embedding generation
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Generate embeddings for multiple texts (batch)
    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Content-hash seeded pseudo-random embedder
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Stable seed derived from the SHA-256 of the text
    pub fn seed_for(text: &str) -> u64 {
        let digest = Sha256::digest(text.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(Self::seed_for(text));
        (0..self.dimension).map(|_| rng.gen::<f32>()).collect()
    }

    fn model_name(&self) -> &str {
        "hash-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Inner product of two equal-length vectors
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Create an embedder based on configuration
pub fn create_embedder(provider: &str, dimension: usize) -> Arc<dyn Embedder> {
    match provider {
        "hash" => Arc::new(HashEmbedder::new(dimension)),
        _ => {
            tracing::warn!(provider = provider, "Unknown embedding provider, using hash");
            Arc::new(HashEmbedder::new(dimension))
        }
    }
}
