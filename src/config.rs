//! Configuration for the face capture detector.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default idle interval of the watch loop.
pub const DEFAULT_WATCHLOOP_INTERVAL: Duration = Duration::from_secs(13);

/// Default time an unpaired face may wait for its background file.
pub const DEFAULT_MAINLOOP_TIMEOUT: Duration = Duration::from_secs(7);

/// Default quiet period after which a file is considered fully written.
pub const DEFAULT_FSNOTIFYLOOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a single detector instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Directory the camera drops image files into
    pub path: PathBuf,

    /// Idle interval of the watch loop; each idle tick re-checks the directory
    #[serde(rename = "watchloop_interval_ms", with = "duration_ms")]
    pub watchloop_interval: Duration,

    /// How long a face candidate waits for a background file before it is
    /// flushed on its own
    #[serde(rename = "mainloop_timeout_ms", with = "duration_ms")]
    pub mainloop_timeout: Duration,

    /// Per-file debounce window; a file settles once no write arrives for this long
    #[serde(rename = "fsnotifyloop_timeout_ms", with = "duration_ms")]
    pub fsnotifyloop_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            watchloop_interval: DEFAULT_WATCHLOOP_INTERVAL,
            mainloop_timeout: DEFAULT_MAINLOOP_TIMEOUT,
            fsnotifyloop_timeout: DEFAULT_FSNOTIFYLOOP_TIMEOUT,
        }
    }
}

impl DetectorConfig {
    /// Create a configuration watching `path` with default timers.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_watchloop_interval(mut self, interval: Duration) -> Self {
        self.watchloop_interval = interval;
        self
    }

    pub fn with_mainloop_timeout(mut self, timeout: Duration) -> Self {
        self.mainloop_timeout = timeout;
        self
    }

    pub fn with_fsnotifyloop_timeout(mut self, timeout: Duration) -> Self {
        self.fsnotifyloop_timeout = timeout;
        self
    }

    /// Check the configuration before a detector is started.
    ///
    /// The watch path must name an existing directory and every timer must be
    /// non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath);
        }
        if !self.path.is_dir() {
            return Err(ConfigError::NotADirectory(self.path.clone()));
        }

        let timers = [
            ("watchloop_interval", self.watchloop_interval),
            ("mainloop_timeout", self.mainloop_timeout),
            ("fsnotifyloop_timeout", self.fsnotifyloop_timeout),
        ];
        for (name, value) in timers {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        Ok(())
    }
}

/// Top-level configuration: which driver to use and how to run it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the registered driver (file naming convention)
    pub driver: String,

    /// Detector settings
    pub detector: DetectorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: "dahua".to_string(),
            detector: DetectorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Get the path to the default configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("face-capture-detector")
            .join("config.json")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    /// No watch directory was given
    MissingPath,
    /// The watch path does not exist or is not a directory
    NotADirectory(PathBuf),
    /// A timer was configured as zero
    ZeroDuration(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::MissingPath => write!(f, "Watch path is required"),
            ConfigError::NotADirectory(path) => {
                write!(f, "Watch path is not a directory: {}", path.display())
            }
            ConfigError::ZeroDuration(name) => write!(f, "{name} must be greater than zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
