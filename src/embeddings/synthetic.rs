//! Deterministic embeddings for environments without an embedding model.
//!
//! Each lowercase word maps to a pseudo-random vector seeded from its SHA-256
//! digest, with components in `[-0.1, 0.1]`; a text's embedding is the sum of
//! its word vectors. Texts sharing words therefore get positive similarity,
//! unrelated texts land near zero. This is far weaker than a real model,
//! hence the separate threshold preset.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;

const COMPONENT_RANGE: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    dimensions: usize,
}

impl SyntheticProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Synchronous embedding; `None` for text without any word.
    pub fn embed_text(&self, text: &str) -> Option<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let mut words = 0usize;

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut rng = StdRng::seed_from_u64(word_seed(&word.to_lowercase()));
            for value in embedding.iter_mut() {
                *value += rng.random_range(-COMPONENT_RANGE..=COMPONENT_RANGE);
            }
            words += 1;
        }

        (words > 0 && self.dimensions > 0).then_some(embedding)
    }
}

fn word_seed(word: &str) -> u64 {
    let digest = Sha256::digest(word.as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed)
}

impl EmbeddingProvider for SyntheticProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        self.embed_text(text)
    }
}
