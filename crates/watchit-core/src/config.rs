//! Configuration structures for watchit.
//!
//! - [`SchedulerConfig`] - Polling interval and dispatch concurrency
//! - [`ThresholdConfig`] - Limits for the process CPU, memory and I/O watches
//! - [`HttpConfig`] - URL watch request settings
//! - [`ProcFsConfig`] - Location of the kernel process filesystem
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] and deserialize from JSON
//! with missing fields falling back to those defaults.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a polling scheduler.
///
/// # Examples
///
/// ```
/// use watchit_core::SchedulerConfig;
///
/// let config = SchedulerConfig::default();
/// assert_eq!(config.interval_secs, 1);
/// assert_eq!(config.max_in_flight, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds to wait between polling cycles. Must be at least 1.
    pub interval_secs: u64,

    /// Maximum number of trigger handlers running at once.
    ///
    /// Dispatches beyond this bound are dropped rather than queued.
    pub max_in_flight: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            max_in_flight: 64,
        }
    }
}

/// Thresholds for the derived-metric process watches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// CPU usage ratio (1.0 = one full core) above which an event fires.
    pub cpu_ratio: f64,

    /// Resident memory in bytes above which an event fires.
    pub memory_bytes: u64,

    /// Read or write rate in bytes per second above which an event fires.
    pub io_bytes_per_sec: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu_ratio: 0.5,
            memory_bytes: 512 * 1024 * 1024,
            io_bytes_per_sec: 10.0 * 1024.0 * 1024.0,
        }
    }
}

/// Settings for the URL watch's HEAD requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// Location of the kernel process filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcFsConfig {
    /// Mount point, normally `/proc`.
    pub root: Utf8PathBuf,
}

impl Default for ProcFsConfig {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("/proc"),
        }
    }
}

/// Root configuration for watchit.
///
/// # Examples
///
/// ```
/// use watchit_core::Config;
///
/// let config = Config::default();
/// assert!(config.validate().is_ok());
///
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// assert!(json.contains("interval_secs"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler configuration.
    pub scheduler: SchedulerConfig,

    /// Process watch thresholds.
    pub thresholds: ThresholdConfig,

    /// URL watch configuration.
    pub http: HttpConfig,

    /// Process filesystem configuration.
    pub procfs: ProcFsConfig,
}

impl Config {
    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields take their default values. The loaded configuration
    /// is validated before being returned.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every option holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::invalid_option(
                "scheduler.interval_secs",
                "must be at least 1",
            ));
        }
        if self.scheduler.max_in_flight == 0 {
            return Err(ConfigError::invalid_option(
                "scheduler.max_in_flight",
                "must be at least 1",
            ));
        }
        if self.thresholds.cpu_ratio.is_nan() || self.thresholds.cpu_ratio < 0.0 {
            return Err(ConfigError::invalid_option(
                "thresholds.cpu_ratio",
                "must be a non-negative number",
            ));
        }
        if self.thresholds.io_bytes_per_sec.is_nan() || self.thresholds.io_bytes_per_sec < 0.0 {
            return Err(ConfigError::invalid_option(
                "thresholds.io_bytes_per_sec",
                "must be a non-negative number",
            ));
        }
        if self.procfs.root.as_str().is_empty() {
            return Err(ConfigError::invalid_option("procfs.root", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval_secs, 1);
        assert_eq!(config.max_in_flight, 64);
    }

    #[test]
    fn test_procfs_default_root() {
        assert_eq!(ProcFsConfig::default().root.as_str(), "/proc");
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"scheduler": {"interval_secs": 5}, "thresholds": {"cpu_ratio": 0.9}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.scheduler.interval_secs, 5);
        assert_eq!(config.scheduler.max_in_flight, 64);
        assert!((config.thresholds.cpu_ratio - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.http.timeout_secs, 10);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.scheduler.interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scheduler.interval_secs"));

        config.scheduler.interval_secs = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_rejects_zero_interval() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"scheduler": {{"interval_secs": 0}}}}"#).unwrap();
        let path = Utf8Path::from_path(file.path()).unwrap();

        assert!(matches!(
            Config::from_file(path),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_in_flight() {
        let mut config = Config::default();
        config.scheduler.max_in_flight = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_in_flight"));
    }

    #[test]
    fn test_validate_rejects_nan_threshold() {
        let mut config = Config::default();
        config.thresholds.cpu_ratio = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"http": {{"timeout_secs": 3}}}}"#).unwrap();
        let path = Utf8Path::from_path(file.path()).unwrap();

        let config = Config::from_file(path).unwrap();
        assert_eq!(config.http.timeout_secs, 3);
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file(Utf8Path::new("/nonexistent/watchit.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
