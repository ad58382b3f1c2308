use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::atomic_write;

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default embedding model (384-dim, matches the on-device model of the app)
const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
/// Default embedding dimensions
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
/// Default maximum characters of note text fed to the embedding model
const DEFAULT_MAX_CONTENT_LENGTH: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("config file is not valid utf8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Similarity cut-offs shared by the ranker and the layout engine.
///
/// All comparisons against these values are strict (`>`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityThresholds {
    /// Minimum similarity for a pair to attract in the layout
    #[serde(default = "default_attraction_threshold")]
    pub attraction: f32,

    /// Minimum similarity for a pair to be drawn as an edge
    #[serde(default = "default_display_threshold")]
    pub display: f32,

    /// Minimum combined ranker score for a note to be returned
    #[serde(default = "default_ranker_cutoff")]
    pub ranker_cutoff: f32,
}

impl SimilarityThresholds {
    /// Thresholds tuned for real sentence-transformer embeddings.
    pub const fn real() -> Self {
        Self {
            attraction: 0.5,
            display: 0.7,
            ranker_cutoff: 0.3,
        }
    }

    /// Thresholds for synthetic embeddings, whose pairwise similarity
    /// clusters tightly around zero.
    pub const fn synthetic() -> Self {
        Self {
            attraction: 0.05,
            display: 0.1,
            ranker_cutoff: 0.3,
        }
    }

    /// Look up a named preset.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "real" | "default" => Some(Self::real()),
            "synthetic" | "simulator" => Some(Self::synthetic()),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("attraction", self.attraction),
            ("display", self.display),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "thresholds.{name} must be between -1.0 and 1.0, got {value}"
                )));
            }
        }

        if !self.ranker_cutoff.is_finite() || self.ranker_cutoff < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "thresholds.ranker_cutoff must be a non-negative number, got {}",
                self.ranker_cutoff
            )));
        }

        if self.display < self.attraction {
            log::warn!(
                "thresholds.display ({}) is below thresholds.attraction ({}); \
                 some edges will connect pairs that do not attract",
                self.display,
                self.attraction
            );
        }

        Ok(())
    }
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self::real()
    }
}

fn default_attraction_threshold() -> f32 {
    SimilarityThresholds::real().attraction
}

fn default_display_threshold() -> f32 {
    SimilarityThresholds::real().display
}

fn default_ranker_cutoff() -> f32 {
    SimilarityThresholds::real().ranker_cutoff
}

/// Force simulation tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Number of ticks per run
    #[serde(default = "default_tick_count")]
    pub tick_count: usize,

    /// Delay between ticks when driven by the async driver
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Inverse-square repulsion constant
    #[serde(default = "default_repulsion")]
    pub repulsion: f64,

    /// Pairs farther apart than this do not repel
    #[serde(default = "default_max_repulsion_distance")]
    pub max_repulsion_distance: f64,

    /// Distances below this are treated as this value for repulsion
    #[serde(default = "default_min_distance")]
    pub min_distance: f64,

    /// Rest length of the similarity spring at zero similarity
    #[serde(default = "default_spring_length")]
    pub spring_length: f64,

    /// Spring stiffness, scaled again by pair similarity
    #[serde(default = "default_spring_strength")]
    pub spring_strength: f64,

    /// Pull toward the category anchor, per pixel of displacement
    #[serde(default = "default_gravity")]
    pub gravity: f64,

    /// Largest displacement a node may take in one tick
    #[serde(default = "default_max_step")]
    pub max_step: f64,

    /// Nodes are kept this far from every canvas edge
    #[serde(default = "default_padding")]
    pub padding: f64,

    /// Anchor circle radius as a fraction of half the shorter canvas side
    #[serde(default = "default_anchor_radius_ratio")]
    pub anchor_radius_ratio: f64,

    /// Seed positions are jittered by up to this many pixels per axis
    #[serde(default = "default_seed_jitter")]
    pub seed_jitter: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            tick_count: default_tick_count(),
            tick_interval_ms: default_tick_interval_ms(),
            repulsion: default_repulsion(),
            max_repulsion_distance: default_max_repulsion_distance(),
            min_distance: default_min_distance(),
            spring_length: default_spring_length(),
            spring_strength: default_spring_strength(),
            gravity: default_gravity(),
            max_step: default_max_step(),
            padding: default_padding(),
            anchor_radius_ratio: default_anchor_radius_ratio(),
            seed_jitter: default_seed_jitter(),
        }
    }
}

fn default_tick_count() -> usize {
    100
}
fn default_tick_interval_ms() -> u64 {
    12
}
fn default_repulsion() -> f64 {
    800.0
}
fn default_max_repulsion_distance() -> f64 {
    250.0
}
fn default_min_distance() -> f64 {
    1.0
}
fn default_spring_length() -> f64 {
    150.0
}
fn default_spring_strength() -> f64 {
    0.05
}
fn default_gravity() -> f64 {
    0.02
}
fn default_max_step() -> f64 {
    15.0
}
fn default_padding() -> f64 {
    40.0
}
fn default_anchor_radius_ratio() -> f64 {
    0.7
}
fn default_seed_jitter() -> f64 {
    20.0
}

impl LayoutConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("repulsion", self.repulsion),
            ("max_repulsion_distance", self.max_repulsion_distance),
            ("spring_length", self.spring_length),
            ("spring_strength", self.spring_strength),
            ("gravity", self.gravity),
            ("padding", self.padding),
            ("anchor_radius_ratio", self.anchor_radius_ratio),
            ("seed_jitter", self.seed_jitter),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "layout.{name} must be a non-negative number, got {value}"
                )));
            }
        }

        for (name, value) in [
            ("min_distance", self.min_distance),
            ("max_step", self.max_step),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "layout.{name} must be greater than 0, got {value}"
                )));
            }
        }

        Ok(())
    }
}

/// Configuration for the embedding provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected embedding dimensions; vectors of any other length are rejected
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Maximum characters of note text fed to the model
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            download_timeout_secs: default_download_timeout_secs(),
            max_content_length: default_max_content_length(),
        }
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_max_content_length() -> usize {
    DEFAULT_MAX_CONTENT_LENGTH
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub thresholds: SimilarityThresholds,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.layout.validate()?;

        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimensions must be greater than 0".to_string(),
            ));
        }
        if self.embedding.download_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "embedding.download_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.embedding.max_content_length < 4 {
            return Err(ConfigError::Invalid(format!(
                "embedding.max_content_length must be at least 4, got {}",
                self.embedding.max_content_length
            )));
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults when
    /// missing and re-saving it when fields were added since it was written.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(base_path)?;
        let path = base_path.join(CONFIG_FILE_NAME);

        // create new if does not exist
        if !path.exists() {
            log::info!("Creating default config at {}", path.display());
            atomic_write(&path, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str = String::from_utf8(std::fs::read(&path)?)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_str = serde_yml::to_string(&self)?;
        atomic_write(&self.base_path.join(CONFIG_FILE_NAME), config_str.as_bytes())?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default() {
        let tmp = tempfile::tempdir().unwrap();

        let config = Config::load_with(tmp.path()).unwrap();

        assert!(tmp.path().join(CONFIG_FILE_NAME).exists());
        assert_eq!(config.thresholds, SimilarityThresholds::real());
        assert_eq!(config.layout, LayoutConfig::default());
        assert_eq!(config.base_path(), tmp.path());
    }

    #[test]
    fn test_partial_config_fills_defaults_and_resaves() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "thresholds:\n  attraction: 0.2\n").unwrap();

        let config = Config::load_with(tmp.path()).unwrap();

        assert!((config.thresholds.attraction - 0.2).abs() < f32::EPSILON);
        assert!((config.thresholds.ranker_cutoff - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.layout.tick_count, 100);

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("ranker_cutoff"));
        assert!(saved.contains("spring_length"));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "thresholds:\n  display: 1.5\n",
        )
        .unwrap();

        let result = Config::load_with(tmp.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let mut config = Config::default();
        config.layout.max_step = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.layout.gravity = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "layout: [1, 2").unwrap();

        let result = Config::load_with(tmp.path());
        assert!(matches!(result, Err(ConfigError::Malformed(_))));
    }

    #[test]
    fn test_presets() {
        assert_eq!(
            SimilarityThresholds::preset("synthetic"),
            Some(SimilarityThresholds::synthetic())
        );
        assert_eq!(
            SimilarityThresholds::preset("Real"),
            Some(SimilarityThresholds::real())
        );
        assert_eq!(SimilarityThresholds::preset("nope"), None);

        let synthetic = SimilarityThresholds::synthetic();
        assert!(synthetic.attraction < SimilarityThresholds::real().attraction);
        assert!(synthetic.display >= synthetic.attraction);
    }
}
