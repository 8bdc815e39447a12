//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default pace and guidance style for new activities
//! - Default meditation, countdown and breathing settings
//! - Executor tuning (progress interval, rep pacing window)
//! - Snapshot database location
//!
//! Configuration is stored at `~/.config/tempocue/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::guidance::ExecutorSettings;
use crate::plan::{ActivityConfig, BreathingPreset, GuidanceStyle, Pace, PlanOptions};

/// Defaults applied to activities that do not set their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub pace: Pace,
    #[serde(default)]
    pub style: GuidanceStyle,
    #[serde(default = "default_meditation_minutes")]
    pub meditation_minutes: u32,
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u32,
    #[serde(default = "default_breathing_preset")]
    pub breathing_preset: BreathingPreset,
    /// Target length for breathing sessions. Zero keeps the preset's own
    /// cycle count.
    #[serde(default)]
    pub breathing_target_seconds: u32,
}

/// Executor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    #[serde(default = "default_rep_window")]
    pub rep_window: usize,
    #[serde(default = "default_rep_deviation_threshold")]
    pub rep_deviation_threshold: f64,
    /// Upper bound on how long the async driver sleeps between checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreathingConfig {
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File name of the snapshot database inside the data directory.
    #[serde(default = "default_snapshot_db")]
    pub snapshot_db: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/tempocue/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub breathing: BreathingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// Default functions
fn default_meditation_minutes() -> u32 {
    10
}
fn default_countdown_seconds() -> u32 {
    300
}
fn default_breathing_preset() -> BreathingPreset {
    BreathingPreset::Box
}
fn default_progress_interval_ms() -> u64 {
    1_000
}
fn default_rep_window() -> usize {
    crate::guidance::reps::DEFAULT_WINDOW
}
fn default_rep_deviation_threshold() -> f64 {
    crate::guidance::reps::DEFAULT_DEVIATION
}
fn default_poll_interval_ms() -> u64 {
    250
}
fn default_max_cycles() -> u32 {
    crate::plan::breathing::DEFAULT_MAX_CYCLES
}
fn default_snapshot_db() -> String {
    "snapshots.db".into()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            pace: Pace::Normal,
            style: GuidanceStyle::Full,
            meditation_minutes: default_meditation_minutes(),
            countdown_seconds: default_countdown_seconds(),
            breathing_preset: default_breathing_preset(),
            breathing_target_seconds: 0,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            rep_window: default_rep_window(),
            rep_deviation_threshold: default_rep_deviation_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_db: default_snapshot_db(),
        }
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
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

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
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// `~/.config/tempocue/config.toml`
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()
            .map_err(|e| ConfigError::DataDir(e.to_string()))?
            .join("config.toml"))
    }

    /// Load from disk or return default, writing the default out on first
    /// use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
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

    /// Set a config value by dot-separated key. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit
    /// the field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            progress_interval_ms: self.executor.progress_interval_ms,
            rep_window: self.executor.rep_window.max(1),
            rep_deviation_threshold: self.executor.rep_deviation_threshold,
            plan_options: PlanOptions {
                max_breathing_cycles: self.breathing.max_cycles.max(1),
            },
        }
    }

    /// Fill in the configured pace and style for an activity file that
    /// left them at their defaults.
    pub fn apply_defaults(&self, mut activity: ActivityConfig) -> ActivityConfig {
        if activity.pace == Pace::Normal {
            activity.pace = self.defaults.pace;
        }
        if activity.style == GuidanceStyle::Full {
            activity.style = self.defaults.style;
        }
        activity
    }

    pub fn snapshot_db_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(data_dir()
            .map_err(|e| ConfigError::DataDir(e.to_string()))?
            .join(&self.storage.snapshot_db))
    }
}
