//! TOML-based application configuration.
//!
//! Holds the interval lengths and policy switches the state machine reads.
//! Configuration is stored at `<data dir>/config.toml`; the core never
//! writes it back on its own, the settings front end does.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Interval lengths and policy switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work_interval")]
    pub work_interval_minutes: u32,
    #[serde(default = "default_short_rest")]
    pub short_rest_minutes: u32,
    #[serde(default = "default_long_rest")]
    pub long_rest_minutes: u32,
    #[serde(default = "default_work_intervals_in_set")]
    pub work_intervals_in_set: u32,
    /// Go idle after every rest instead of starting the next work interval.
    #[serde(default)]
    pub stop_after_break: bool,
    /// How far past the deadline a work tick may arrive before it counts as
    /// a missed wake-up. Always negative.
    #[serde(default = "default_overrun_limit")]
    pub overrun_limit_seconds: i64,
    /// Grace period for confirming the return to work after a short rest.
    /// Zero disables the prompt.
    #[serde(default = "default_return_to_work_countdown")]
    pub return_to_work_countdown_seconds: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
}

// Default functions
fn default_work_interval() -> u32 {
    25
}
fn default_short_rest() -> u32 {
    5
}
fn default_long_rest() -> u32 {
    15
}
fn default_work_intervals_in_set() -> u32 {
    4
}
fn default_overrun_limit() -> i64 {
    -60
}
fn default_return_to_work_countdown() -> u32 {
    10
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_interval_minutes: default_work_interval(),
            short_rest_minutes: default_short_rest(),
            long_rest_minutes: default_long_rest(),
            work_intervals_in_set: default_work_intervals_in_set(),
            stop_after_break: false,
            overrun_limit_seconds: default_overrun_limit(),
            return_to_work_countdown_seconds: default_return_to_work_countdown(),
        }
    }
}

impl TimerConfig {
    pub fn work_interval(&self) -> TimeDelta {
        TimeDelta::minutes(self.work_interval_minutes as i64)
    }

    pub fn short_rest(&self) -> TimeDelta {
        TimeDelta::minutes(self.short_rest_minutes as i64)
    }

    pub fn long_rest(&self) -> TimeDelta {
        TimeDelta::minutes(self.long_rest_minutes as i64)
    }

    pub fn overrun_limit(&self) -> TimeDelta {
        TimeDelta::seconds(self.overrun_limit_seconds)
    }

    /// Reject values the state machine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("timer.work_interval_minutes", self.work_interval_minutes),
            ("timer.short_rest_minutes", self.short_rest_minutes),
            ("timer.long_rest_minutes", self.long_rest_minutes),
            ("timer.work_intervals_in_set", self.work_intervals_in_set),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        if self.overrun_limit_seconds >= 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.overrun_limit_seconds".into(),
                message: "must be negative".into(),
            });
        }
        Ok(())
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
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(format!("cannot parse '{value}' as bool: {e}")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<i64>()
                            .map_err(|e| invalid(format!("cannot parse '{value}' as integer: {e}")))?;
                        serde_json::Value::Number(n.into())
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

    /// Default location inside the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or holds
    /// invalid values, or if the defaults cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.timer.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without persisting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting configuration is invalid. `self` is left untouched
    /// on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.timer.validate()?;
        *self = updated;
        Ok(())
    }
}
