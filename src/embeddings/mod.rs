//! Embedding providers and note embedding maintenance.
//!
//! # Architecture
//!
//! - `EmbeddingProvider`: the narrow contract the ranker and back-fill use
//! - `model`: on-device provider wrapping fastembed (feature `fastembed`)
//! - `synthetic`: deterministic stand-in for environments without a model
//! - `preprocess`: turns a note into embedding input and a change hash

#[cfg(feature = "fastembed")]
mod model;
mod preprocess;
mod synthetic;

use std::future::Future;

#[cfg(feature = "fastembed")]
pub use model::FastEmbedProvider;
pub use preprocess::{content_hash, note_content};
pub use synthetic::SyntheticProvider;

use crate::notes::Note;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

/// Text to vector contract.
///
/// Implementations may be slow (on-device inference, network). Failures are
/// reported as `None`; callers treat that as "no semantic signal".
pub trait EmbeddingProvider: Send + Sync {
    /// Dimension of every vector this provider returns.
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> impl Future<Output = Option<Vec<f32>>> + Send;
}

/// Outcome of [`backfill_embeddings`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub embedded: usize,
    pub up_to_date: usize,
    pub without_text: usize,
    pub failed: usize,
}

/// Whether the note's stored embedding was produced from `hash` and has the
/// provider's dimension.
fn is_up_to_date(note: &Note, hash: &str, dimensions: usize) -> bool {
    match (&note.embedding, &note.content_hash) {
        (Some(embedding), Some(stored)) => stored == hash && embedding.len() == dimensions,
        _ => false,
    }
}

/// Compute embeddings for notes that have none, or whose text changed since
/// their embedding was computed.
///
/// Vectors whose length differs from `provider.dimensions()` are rejected so
/// every stored embedding shares one dimension. `on_progress` is called once
/// per note.
pub async fn backfill_embeddings<P: EmbeddingProvider>(
    provider: &P,
    notes: &mut [Note],
    max_content_length: usize,
    mut on_progress: impl FnMut(&Note),
) -> BackfillReport {
    let mut report = BackfillReport::default();
    let dimensions = provider.dimensions();

    for note in notes.iter_mut() {
        let Some(content) = note_content(note, max_content_length) else {
            report.without_text += 1;
            on_progress(note);
            continue;
        };

        let hash = content_hash(&content);
        if is_up_to_date(note, &hash, dimensions) {
            report.up_to_date += 1;
            on_progress(note);
            continue;
        }

        match provider.embed(&content).await {
            Some(embedding) if embedding.len() == dimensions => {
                note.embedding = Some(embedding);
                note.content_hash = Some(hash);
                report.embedded += 1;
            }
            Some(embedding) => {
                log::warn!(
                    "Discarding embedding for note {}: expected {} dimensions, got {}",
                    note.id,
                    dimensions,
                    embedding.len()
                );
                report.failed += 1;
            }
            None => {
                log::warn!("No embedding produced for note {}", note.id);
                report.failed += 1;
            }
        }

        on_progress(note);
    }

    log::info!(
        "Embedding back-fill: {} embedded, {} up to date, {} without text, {} failed",
        report.embedded,
        report.up_to_date,
        report.without_text,
        report.failed
    );

    report
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::EmbeddingProvider;

    /// Provider returning canned vectors per exact text, counting calls.
    #[derive(Default)]
    pub struct FakeProvider {
        pub vectors: HashMap<String, Vec<f32>>,
        pub dimensions: usize,
        pub calls: AtomicUsize,
    }

    impl FakeProvider {
        pub fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                ..Default::default()
            }
        }

        pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.to_string(), vector);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EmbeddingProvider for FakeProvider {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed(&self, text: &str) -> Option<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.vectors.get(text).cloned()
        }
    }
}
