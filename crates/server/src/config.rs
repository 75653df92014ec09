//! Engine configuration.
//!
//! Resolved in order: built-in defaults, an optional TOML file, then
//! environment overrides. The result is validated before use.
//!
//! ```toml
//! log_level = "debug"
//!
//! [recommendation]
//! default_count = 20
//! diversity_boost = 0.5
//!
//! [blend]
//! collaborative = 0.5
//! content = 0.3
//! popularity = 0.1
//! diversity = 0.1
//!
//! [debiasing]
//! adversarial = false
//!
//! [exploration]
//! enabled = true
//! strategy = "thompson"
//! noise_std = 0.05
//! ```

use data_loader::AudioWeights;
use pipeline::exploration::DEFAULT_NOISE_STD;
use pipeline::{BlendWeights, ExplorationStrategy};
use serde::{Deserialize, Serialize};
use sources::SimilarityMetric;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Env var naming a TOML file when no path is passed explicitly
pub const CONFIG_PATH_VAR: &str = "TUNE_RECS_CONFIG";

const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f32 },

    #[error("default count {count} must be between 1 and the maximum {max}")]
    InvalidCount { count: usize, max: usize },

    #[error("cache TTL must be positive")]
    ZeroTtl,

    #[error("audio weights sum to zero")]
    ZeroAudioWeights,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationSettings {
    pub default_count: usize,
    pub max_count: usize,
    /// Diversity boost used when a request does not set one
    pub diversity_boost: f32,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            default_count: 10,
            max_count: 50,
            diversity_boost: 0.3,
        }
    }
}

/// Which debiasing transforms run, and how hard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebiasSettings {
    pub popularity_penalty: bool,
    pub penalty_strength: f32,
    pub fairness: bool,
    pub min_niche_ratio: f32,
    pub min_diverse_genres: usize,
    pub diversity_injection: bool,
    pub injection_rate: f32,
    pub adversarial: bool,
    pub bias_threshold: f32,
}

impl Default for DebiasSettings {
    fn default() -> Self {
        Self {
            popularity_penalty: true,
            penalty_strength: 0.5,
            fairness: true,
            min_niche_ratio: 0.3,
            min_diverse_genres: 3,
            diversity_injection: true,
            injection_rate: 0.3,
            adversarial: true,
            bias_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationKind {
    #[default]
    EpsilonGreedy,
    Thompson,
}

impl FromStr for ExplorationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "epsilon_greedy" => Ok(ExplorationKind::EpsilonGreedy),
            "thompson" => Ok(ExplorationKind::Thompson),
            other => Err(format!("unknown exploration strategy {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationSettings {
    pub enabled: bool,
    #[serde(rename = "strategy")]
    pub kind: ExplorationKind,
    /// Epsilon of the epsilon-greedy explorer
    pub rate: f32,
    /// Score noise of the Thompson explorer
    pub noise_std: f32,
    pub seed: Option<u64>,
}

impl Default for ExplorationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: ExplorationKind::EpsilonGreedy,
            rate: 0.2,
            noise_std: DEFAULT_NOISE_STD,
            seed: None,
        }
    }
}

impl ExplorationSettings {
    pub fn strategy(&self) -> ExplorationStrategy {
        match self.kind {
            ExplorationKind::EpsilonGreedy => ExplorationStrategy::EpsilonGreedy { epsilon: self.rate },
            ExplorationKind::Thompson => ExplorationStrategy::Thompson {
                noise_std: self.noise_std,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborativeSettings {
    pub enabled: bool,
    pub hidden_layers: Vec<usize>,
    pub max_iter: usize,
    pub seed: u64,
}

impl Default for CollaborativeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            hidden_layers: vec![128, 64, 32],
            max_iter: 200,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub recommendation: RecommendationSettings,
    pub blend: BlendWeights,
    pub audio_weights: AudioWeights,
    /// Track-to-track similarity used by the content scorer
    pub similarity_metric: SimilarityMetric,
    pub debiasing: DebiasSettings,
    pub exploration: ExplorationSettings,
    pub cache: CacheSettings,
    pub collaborative: CollaborativeSettings,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recommendation: RecommendationSettings::default(),
            blend: BlendWeights::default(),
            audio_weights: AudioWeights::default(),
            similarity_metric: SimilarityMetric::default(),
            debiasing: DebiasSettings::default(),
            exploration: ExplorationSettings::default(),
            cache: CacheSettings::default(),
            collaborative: CollaborativeSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults, then `path` (or `$TUNE_RECS_CONFIG`), then environment
    /// overrides, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from `lookup`, normally the process environment
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parsed(&lookup, "DEFAULT_RECOMMENDATION_COUNT")? {
            self.recommendation.default_count = v;
        }
        if let Some(v) = parsed(&lookup, "MAX_RECOMMENDATION_COUNT")? {
            self.recommendation.max_count = v;
        }
        if let Some(v) = parsed(&lookup, "DEFAULT_DIVERSITY_WEIGHT")? {
            self.recommendation.diversity_boost = v;
        }
        if let Some(v) = parsed(&lookup, "DEFAULT_EXPLORATION_RATE")? {
            self.exploration.rate = v;
        }
        if let Some(v) = parsed(&lookup, "EXPLORATION_STRATEGY")? {
            self.exploration.kind = v;
        }
        if let Some(v) = parsed(&lookup, "POPULARITY_BIAS_THRESHOLD")? {
            self.debiasing.bias_threshold = v;
        }
        if let Some(v) = parsed(&lookup, "DIVERSITY_INJECTION_RATE")? {
            self.debiasing.injection_rate = v;
        }
        if let Some(v) = parsed(&lookup, "CACHE_TTL_SECONDS")? {
            self.cache.ttl_seconds = v;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Reject out-of-range settings. Audio weights that do not sum to 1
    /// are rescaled rather than rejected.
    pub fn validate(&mut self) -> Result<()> {
        let unit_fields = [
            ("blend.collaborative", self.blend.collaborative),
            ("blend.content", self.blend.content),
            ("blend.popularity", self.blend.popularity),
            ("blend.diversity", self.blend.diversity),
            ("recommendation.diversity_boost", self.recommendation.diversity_boost),
            ("debiasing.penalty_strength", self.debiasing.penalty_strength),
            ("debiasing.min_niche_ratio", self.debiasing.min_niche_ratio),
            ("debiasing.injection_rate", self.debiasing.injection_rate),
            ("debiasing.bias_threshold", self.debiasing.bias_threshold),
            ("exploration.rate", self.exploration.rate),
            ("exploration.noise_std", self.exploration.noise_std),
        ];
        for (field, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }

        let rec = &self.recommendation;
        if rec.default_count == 0 || rec.default_count > rec.max_count {
            return Err(ConfigError::InvalidCount {
                count: rec.default_count,
                max: rec.max_count,
            });
        }
        if self.cache.ttl_seconds == 0 {
            return Err(ConfigError::ZeroTtl);
        }

        let total = self.audio_weights.sum();
        if total <= 0.0 {
            return Err(ConfigError::ZeroAudioWeights);
        }
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            warn!("Audio weights sum to {:.3}, normalizing", total);
            self.audio_weights = self.audio_weights.normalized();
        }
        Ok(())
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
    }
}
