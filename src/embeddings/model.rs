//! On-device embedding provider backed by fastembed.
//!
//! - Model loading with configurable cache directory
//! - Inference on the blocking pool so async callers never stall a runtime
//!   worker
//! - Dimension probe at load time

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fastembed::{InitOptions, TextEmbedding};

use super::{EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Load the configured model, downloading it into `cache_dir/models` on
    /// first use.
    ///
    /// Fails with [`EmbeddingError::InitFailed`] when the model's output
    /// dimension differs from `config.dimensions`, since stored embeddings
    /// would no longer be comparable.
    pub fn new(config: &EmbeddingConfig, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let model_enum = Self::parse_model_name(&config.model)?;

        // Ensure cache directory exists
        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        log::info!("Loading embedding model '{}'", config.model);

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut model)?;
        if dimensions != config.dimensions {
            return Err(EmbeddingError::InitFailed(format!(
                "model '{}' produces {} dimensions, config expects {}",
                config.model, dimensions, config.dimensions
            )));
        }

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: config.model.clone(),
            dimensions,
        })
    }

    /// Like [`FastEmbedProvider::new`], but gives up once
    /// `config.download_timeout_secs` have passed. A download still running
    /// at that point is left to finish in the background.
    pub fn load(config: &EmbeddingConfig, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let (tx, rx) = mpsc::channel();
        let thread_config = config.clone();
        std::thread::spawn(move || {
            let _ = tx.send(Self::new(&thread_config, cache_dir));
        });

        let timeout = Duration::from_secs(config.download_timeout_secs);
        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EmbeddingError::InitFailed(format!(
                "model '{}' not ready after {}s",
                config.model, config.download_timeout_secs
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(EmbeddingError::InitFailed(
                "model loader thread panicked".to_string(),
            )),
        }
    }

    /// Get the model name
    pub fn name(&self) -> &str {
        &self.model_name
    }

    fn run(model: &Mutex<TextEmbedding>, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut model = model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" | "allminiml6v2q" => {
                Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q)
            }
            "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-small-en-v1.5-q" | "bgesmallenv15q" => {
                Ok(fastembed::EmbeddingModel::BGESmallENV15Q)
            }
            _ => Err(EmbeddingError::InvalidModel(format!(
                "Unknown model: {}. Supported 384-dim models: all-MiniLM-L6-v2, bge-small-en-v1.5 (add -q suffix for quantized)",
                name
            ))),
        }
    }

    /// Probe the model to determine embedding dimensions.
    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        let test_embeddings = model
            .embed(vec!["test"], None)
            .map_err(|e| EmbeddingError::InitFailed(format!("Failed to probe dimensions: {}", e)))?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let model = self.model.clone();
        let text = text.to_string();

        let result = tokio::task::spawn_blocking(move || Self::run(&model, &text)).await;

        match result {
            Ok(Ok(embedding)) => Some(embedding),
            Ok(Err(e)) => {
                log::warn!("{e}");
                None
            }
            Err(e) => {
                log::warn!("Embedding task failed: {e}");
                None
            }
        }
    }
}
