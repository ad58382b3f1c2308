//! Vector similarity math shared by the ranker and the layout engine.
//!
//! Embeddings handed to this module may come from different model
//! generations, so nothing here assumes equal dimensions or unit norm.

use rayon::prelude::*;

/// Cosine similarity between two vectors.
///
/// Returns `0.0` when the lengths differ, when either vector is empty,
/// or when either vector has zero norm. Otherwise the result lies in
/// `[-1.0, 1.0]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let similarity = dot_product / (norm_a * norm_b);

    // rounding can push identical vectors a hair past 1.0
    similarity.clamp(-1.0, 1.0)
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Pairwise similarities for one fixed set of embeddings.
///
/// Stored densely as `n * n`; `None` marks a pair where at least one side
/// has no embedding, and the diagonal.
#[derive(Debug, Clone, Default)]
pub struct SimilarityMatrix {
    size: usize,
    values: Vec<Option<f32>>,
}

impl SimilarityMatrix {
    /// Compute all pairwise similarities. Rows are filled in parallel.
    pub fn compute(embeddings: &[Option<&[f32]>]) -> Self {
        let size = embeddings.len();

        let values: Vec<Option<f32>> = (0..size)
            .into_par_iter()
            .flat_map_iter(|i| {
                (0..size).map(move |j| {
                    if i == j {
                        return None;
                    }
                    match (embeddings[i], embeddings[j]) {
                        (Some(a), Some(b)) => Some(cosine_similarity(a, b)),
                        _ => None,
                    }
                })
            })
            .collect();

        Self { size, values }
    }

    /// Number of rows (and columns).
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Similarity between item `i` and item `j`, if both have embeddings.
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i >= self.size || j >= self.size {
            return None;
        }
        self.values[i * self.size + j]
    }
}
