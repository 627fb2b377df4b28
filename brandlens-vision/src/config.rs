//! Configuration for brandlens-vision
//!
//! Bootstrap configuration comes from a TOML file resolved by
//! `brandlens_common::config` (CLI → `BRANDLENS_CONFIG` → platform file →
//! built-in defaults). Each capability section is a set of overrides merged
//! onto that capability's own defaults, so a partial `[similarity]` section
//! keeps the comparator's no-retry policy unless it says otherwise.
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [storage]
//! artifact_dir = "/var/lib/brandlens/artifacts"
//!
//! [object_detector]
//! program = "python3"
//! args = ["yolo/detect.py"]
//! timeout_secs = 60
//!
//! [similarity]
//! retry_on_failure = false
//! ```

use crate::aggregation::sentiment::HeuristicSentimentPolicy;
use brandlens_common::config::{
    load_toml_or_default, resolve_config_path, write_toml_config, ConfigSource, LoggingConfig,
};
use brandlens_common::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "BRANDLENS_CONFIG";

/// Application name used for the platform config file location
pub const APP_NAME: &str = "brandlens";

/// Default YOLO detection confidence threshold
pub const DEFAULT_DETECTION_THRESHOLD: f64 = 0.25;

/// Default minimum average confidence for a brand to be reported
pub const DEFAULT_MIN_BRAND_CONFIDENCE: f64 = 0.5;

/// Resolved settings for one external analysis process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// When false the capability is never invoked
    pub enabled: bool,
    /// Executable to spawn
    pub program: String,
    /// Arguments placed before the per-call arguments
    pub args: Vec<String>,
    /// Per-invocation timeout
    pub timeout_secs: u64,
    /// Keep attempting after a missing-dependency failure
    pub retry_on_failure: bool,
}

impl CapabilityConfig {
    /// Python script invoked through `python3`
    pub fn python_script(script: &str, timeout_secs: u64, retry_on_failure: bool) -> Self {
        Self {
            enabled: true,
            program: "python3".to_string(),
            args: vec![script.to_string()],
            timeout_secs,
            retry_on_failure,
        }
    }

    pub fn object_detector_default() -> Self {
        Self::python_script("yolo/detect.py", 60, true)
    }

    pub fn text_extractor_default() -> Self {
        Self::python_script("yolo/ocr.py", 60, true)
    }

    /// Embedding generation is expensive, so a missing dependency is final
    pub fn similarity_default() -> Self {
        Self::python_script("yolo/clip_similarity.py", 120, false)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Optional per-capability overrides as written in TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityOverrides {
    pub enabled: Option<bool>,
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub retry_on_failure: Option<bool>,
    /// Only read by the object detector
    pub confidence_threshold: Option<f64>,
}

impl CapabilityOverrides {
    /// Overrides that reproduce `config` exactly
    pub fn from_config(config: &CapabilityConfig, confidence_threshold: Option<f64>) -> Self {
        Self {
            enabled: Some(config.enabled),
            program: Some(config.program.clone()),
            args: Some(config.args.clone()),
            timeout_secs: Some(config.timeout_secs),
            retry_on_failure: Some(config.retry_on_failure),
            confidence_threshold,
        }
    }

    /// Merge onto `base`, preferring explicitly set fields
    pub fn apply(&self, base: CapabilityConfig) -> CapabilityConfig {
        CapabilityConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            program: self.program.clone().unwrap_or(base.program),
            args: self.args.clone().unwrap_or(base.args),
            timeout_secs: self.timeout_secs.unwrap_or(base.timeout_secs),
            retry_on_failure: self.retry_on_failure.unwrap_or(base.retry_on_failure),
        }
    }
}

/// Artifact and cache locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory receiving one `<run_id>.json` artifact per run
    pub artifact_dir: PathBuf,
    /// Root for per-run reference embedding caches
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("brandlens_artifacts"),
            cache_dir: std::env::temp_dir().join("brandlens"),
        }
    }
}

/// Cross-frame aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Minimum average confidence for a brand to appear in `brandsDetected`
    pub min_brand_confidence: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_brand_confidence: DEFAULT_MIN_BRAND_CONFIDENCE,
        }
    }
}

/// TOML file layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionToml {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub object_detector: CapabilityOverrides,
    pub text_extractor: CapabilityOverrides,
    pub similarity: CapabilityOverrides,
    pub aggregation: AggregationConfig,
    pub sentiment: HeuristicSentimentPolicy,
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct VisionConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub object_detector: CapabilityConfig,
    pub detection_threshold: f64,
    pub text_extractor: CapabilityConfig,
    pub similarity: CapabilityConfig,
    pub aggregation: AggregationConfig,
    pub sentiment: HeuristicSentimentPolicy,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self::from(VisionToml::default())
    }
}

impl From<VisionToml> for VisionConfig {
    fn from(raw: VisionToml) -> Self {
        let detection_threshold = raw
            .object_detector
            .confidence_threshold
            .unwrap_or(DEFAULT_DETECTION_THRESHOLD)
            .clamp(0.0, 1.0);

        Self {
            object_detector: raw
                .object_detector
                .apply(CapabilityConfig::object_detector_default()),
            text_extractor: raw
                .text_extractor
                .apply(CapabilityConfig::text_extractor_default()),
            similarity: raw.similarity.apply(CapabilityConfig::similarity_default()),
            detection_threshold,
            logging: raw.logging,
            storage: raw.storage,
            aggregation: raw.aggregation,
            sentiment: raw.sentiment,
        }
    }
}

impl From<&VisionConfig> for VisionToml {
    fn from(config: &VisionConfig) -> Self {
        Self {
            logging: config.logging.clone(),
            storage: config.storage.clone(),
            object_detector: CapabilityOverrides::from_config(
                &config.object_detector,
                Some(config.detection_threshold),
            ),
            text_extractor: CapabilityOverrides::from_config(&config.text_extractor, None),
            similarity: CapabilityOverrides::from_config(&config.similarity, None),
            aggregation: config.aggregation.clone(),
            sentiment: config.sentiment.clone(),
        }
    }
}

impl VisionConfig {
    /// Resolve and load configuration
    ///
    /// A missing file yields defaults; a malformed file is an error.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let (path, source) = resolve_config_path(cli_path, CONFIG_ENV_VAR, APP_NAME);
        let raw: VisionToml = load_toml_or_default(path.as_deref())?;

        if source != ConfigSource::Defaults {
            info!(source = ?source, "Configuration source resolved");
        }

        Ok(Self::from(raw))
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: VisionToml = toml::from_str(content)
            .map_err(|e| brandlens_common::Error::Config(format!("Parse TOML failed: {}", e)))?;
        Ok(Self::from(raw))
    }

    /// Write the fully resolved configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        write_toml_config(&VisionToml::from(self), path)
    }
}
