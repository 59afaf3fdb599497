//! Configuration for the evtrack pipeline.
//!
//! A [`Config`] is resolved once at start by merging [`ConfigOverrides`] over
//! defaults (or over a loaded file) and is read-only afterwards.

use crate::collector::EventCategory;
use crate::core::sampling::SamplingMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default batch period.
pub const DEFAULT_POST_INTERVAL: Duration = Duration::from_secs(30);

/// Longest accepted batch period.
pub const MAX_POST_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default sampling threshold.
pub const DEFAULT_SAMPLING_FREQ: f64 = 10.0;

/// Default campaign tag.
pub const DEFAULT_TASK_NAME: &str = "evtrack";

/// Main pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collector address that receives init and append requests
    pub post_server: String,

    /// Batch period, both for the deferred first send and recurring appends
    #[serde(with = "duration_serde")]
    pub post_interval: Duration,

    /// Sampling gate; 0 records everything
    pub sampling_freq: f64,

    /// How `sampling_freq` is turned into a minimum spacing
    pub sampling_mode: SamplingMode,

    /// Campaign/session tag sent with the init request
    pub task_name: String,

    /// Descriptive page layout sent with the init request
    pub layout_type: LayoutType,

    /// Which event categories to subscribe to
    pub sources: SourceConfig,

    /// Optional cap on buffered records; oldest are evicted first
    pub max_buffer_records: Option<usize>,

    /// Verbose logging
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            post_server: String::new(),
            post_interval: DEFAULT_POST_INTERVAL,
            sampling_freq: DEFAULT_SAMPLING_FREQ,
            sampling_mode: SamplingMode::Milliseconds,
            task_name: DEFAULT_TASK_NAME.to_string(),
            layout_type: LayoutType::Liquid,
            sources: SourceConfig::default(),
            max_buffer_records: None,
            debug: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a file, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("evtrack")
            .join("config.json")
    }

    /// Merge overrides on top of this configuration.
    ///
    /// Absent or `null` values keep the current setting.
    pub fn merged(&self, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = self.clone();

        if let Some(ref server) = overrides.post_server {
            config.post_server = server.clone();
        }
        if let Some(secs) = overrides.post_interval {
            config.post_interval = Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|d| !d.is_zero())
                .ok_or_else(|| {
                    ConfigError::Invalid(format!("post interval must be positive, got {secs}"))
                })?;
        }
        if let Some(freq) = overrides.sampling_freq {
            config.sampling_freq = freq;
        }
        if let Some(mode) = overrides.sampling_mode {
            config.sampling_mode = mode;
        }
        if let Some(ref task) = overrides.task_name {
            config.task_name = task.clone();
        }
        if let Some(layout) = overrides.layout_type {
            config.layout_type = layout;
        }
        if let Some(ref sources) = overrides.sources {
            config.sources = sources.clone();
        }
        if let Some(cap) = overrides.max_buffer_records {
            config.max_buffer_records = Some(cap);
        }
        if let Some(debug) = overrides.debug {
            config.debug = debug;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.post_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "post interval must be positive".to_string(),
            ));
        }
        if self.post_interval > MAX_POST_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "post interval must be at most {}s, got {}s",
                MAX_POST_INTERVAL.as_secs(),
                self.post_interval.as_secs_f64()
            )));
        }
        if !self.sampling_freq.is_finite() || self.sampling_freq < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sampling frequency must be a non-negative number, got {}",
                self.sampling_freq
            )));
        }
        if self.max_buffer_records == Some(0) {
            return Err(ConfigError::Invalid(
                "max buffer records must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Start-time overrides. Every field is optional; unknown keys are ignored.
///
/// Both `snake_case` and `camelCase` key spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(alias = "post_server")]
    pub post_server: Option<String>,
    /// Seconds
    #[serde(alias = "post_interval", alias = "postIntervalSeconds")]
    pub post_interval: Option<f64>,
    #[serde(alias = "sampling_freq", alias = "samplingFrequencyHz")]
    pub sampling_freq: Option<f64>,
    #[serde(alias = "sampling_mode")]
    pub sampling_mode: Option<SamplingMode>,
    #[serde(alias = "task_name")]
    pub task_name: Option<String>,
    #[serde(alias = "layout_type")]
    pub layout_type: Option<LayoutType>,
    pub sources: Option<SourceConfig>,
    #[serde(alias = "max_buffer_records")]
    pub max_buffer_records: Option<usize>,
    pub debug: Option<bool>,
}

impl ConfigOverrides {
    /// Parse overrides from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Descriptive page layout, sent as metadata with the init request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutType {
    Left,
    Right,
    Center,
    #[default]
    Liquid,
}

impl LayoutType {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutType::Left => "left",
            LayoutType::Right => "right",
            LayoutType::Center => "center",
            LayoutType::Liquid => "liquid",
        }
    }
}

impl std::fmt::Display for LayoutType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(LayoutType::Left),
            "right" => Ok(LayoutType::Right),
            "center" => Ok(LayoutType::Center),
            "liquid" => Ok(LayoutType::Liquid),
            other => Err(ConfigError::Invalid(format!(
                "unknown layout type '{other}' (expected left, right, center or liquid)"
            ))),
        }
    }
}

/// Configuration for which event categories to capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub mouse: bool,
    pub touch: bool,
    pub keys: bool,
    pub window: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mouse: true,
            touch: true,
            keys: true,
            window: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();
        let has = |names: &[&str]| sources.iter().any(|s| s == "all" || names.contains(&s.as_str()));

        Self {
            mouse: has(&["mouse"]),
            touch: has(&["touch"]),
            keys: has(&["key", "keys", "keyboard"]),
            window: has(&["window"]),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.mouse || self.touch || self.keys || self.window
    }

    /// Whether a category is enabled.
    pub fn allows(&self, category: EventCategory) -> bool {
        match category {
            EventCategory::Mouse => self.mouse,
            EventCategory::Touch => self.touch,
            EventCategory::Key => self.keys,
            EventCategory::Window => self.window,
        }
    }

    /// Enabled categories, in subscription order.
    pub fn categories(&self) -> Vec<EventCategory> {
        EventCategory::ALL
            .into_iter()
            .filter(|c| self.allows(*c))
            .collect()
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as fractional seconds.
mod duration_serde {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}
