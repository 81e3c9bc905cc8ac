//! TOML-based application configuration.
//!
//! Stores:
//! - Default controller settings used when a scenario or host does not
//!   supply its own (recheck interval, accuracy threshold, report interval)
//! - Log filter for the CLI
//!
//! Configuration is stored at `~/.config/geotick/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::controller::settings::{
    DEFAULT_ACCEPTABLE_ACCURACY, DEFAULT_CHECK_INTERVAL, DEFAULT_REPORT_INTERVAL_MINUTES,
};
use crate::error::ConfigError;

/// Controller defaults.
///
/// Values are stored as requested; the controller clamps them at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: f64,
    #[serde(default = "default_acceptable_accuracy")]
    pub acceptable_accuracy: f64,
    #[serde(default = "default_report_interval_minutes")]
    pub report_interval_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by GEOTICK_LOG.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/geotick/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_check_interval_secs() -> f64 {
    DEFAULT_CHECK_INTERVAL.as_secs_f64()
}
fn default_acceptable_accuracy() -> f64 {
    DEFAULT_ACCEPTABLE_ACCURACY
}
fn default_report_interval_minutes() -> u32 {
    DEFAULT_REPORT_INTERVAL_MINUTES
}
fn default_log_filter() -> String {
    "info".into()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            acceptable_accuracy: default_acceptable_accuracy(),
            report_interval_minutes: default_report_interval_minutes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl ControllerConfig {
    /// Recheck interval as a `Duration`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored seconds are negative, NaN or overflow.
    pub fn check_interval(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.check_interval_secs).map_err(|e| {
            ConfigError::InvalidValue {
                key: "controller.check_interval_secs".into(),
                message: e.to_string(),
            }
        })
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Path of the config file in the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or is
    /// invalid, or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// Load and validate a config file at an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// [`Config::validate`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Config = toml::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Reject values the controller cannot be started with.
    ///
    /// Out-of-range but representable values (an interval under 2 s, an
    /// accuracy under 5 m) are accepted; the controller clamps them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.check_interval()?;
        if !self.controller.acceptable_accuracy.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "controller.acceptable_accuracy".into(),
                message: "must be a finite number".into(),
            });
        }
        if self.controller.report_interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "controller.report_interval_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "logging.filter".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value in memory by dot-separated key and validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation. `self` is unchanged on error.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Config::apply`] fails or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.controller.check_interval_secs, 10.0);
        assert_eq!(parsed.controller.acceptable_accuracy, 100.0);
        assert_eq!(parsed.controller.report_interval_minutes, 2);
        assert_eq!(parsed.logging.filter, "info");
    }

    #[test]
    fn missing_sections_take_defaults() {
        let parsed: Config = toml::from_str("[controller]\ncheck_interval_secs = 60.0\n").unwrap();
        assert_eq!(parsed.controller.check_interval_secs, 60.0);
        assert_eq!(parsed.controller.report_interval_minutes, 2);
        assert_eq!(parsed.logging, LoggingConfig::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("controller.report_interval_minutes").as_deref(), Some("2"));
        assert_eq!(cfg.get("logging.filter").as_deref(), Some("info"));
        assert!(cfg.get("controller.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn apply_updates_numbers_and_strings() {
        let mut cfg = Config::default();
        cfg.apply("controller.check_interval_secs", "170").unwrap();
        cfg.apply("controller.acceptable_accuracy", "12.5").unwrap();
        cfg.apply("logging.filter", "geotick_core=debug").unwrap();
        assert_eq!(cfg.controller.check_interval_secs, 170.0);
        assert_eq!(cfg.controller.acceptable_accuracy, 12.5);
        assert_eq!(cfg.logging.filter, "geotick_core=debug");
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("controller.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.apply("controller", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn apply_rejects_bad_values_and_keeps_state() {
        let mut cfg = Config::default();
        assert!(cfg.apply("controller.check_interval_secs", "soon").is_err());
        assert!(cfg.apply("controller.check_interval_secs", "-5").is_err());
        assert!(cfg.apply("controller.report_interval_minutes", "0").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn validate_accepts_values_the_controller_clamps() {
        let mut cfg = Config::default();
        cfg.controller.check_interval_secs = 0.5;
        cfg.controller.acceptable_accuracy = 1.0;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.controller.check_interval().unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn validate_rejects_nan_accuracy() {
        let mut cfg = Config::default();
        cfg.controller.acceptable_accuracy = f64::NAN;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "controller.acceptable_accuracy"
        ));
    }

    #[test]
    fn save_and_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.controller.report_interval_minutes = 5;
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.controller.report_interval_minutes, 5);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "controller = 3").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseFailed(_))));
    }
}
