//! Activity selection shared by `plan`, `run` and `simulate`.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::de::DeserializeOwned;
use tempocue_core::plan::{ActivityConfig, BreathingPreset, GuidanceStyle, Pace};
use tempocue_core::Config;

#[derive(Args, Debug, Clone, Default)]
pub struct ActivityArgs {
    /// Activity file (JSON, or TOML with a .toml extension)
    #[arg(long, short, conflicts_with_all = ["countdown", "meditation", "breathing"])]
    pub file: Option<PathBuf>,
    /// Plain countdown; seconds, or the configured default when omitted
    #[arg(long, num_args = 0..=1, conflicts_with_all = ["meditation", "breathing"])]
    pub countdown: Option<Option<u32>>,
    /// Meditation; minutes, or the configured default when omitted
    #[arg(long, num_args = 0..=1, conflicts_with = "breathing")]
    pub meditation: Option<Option<u32>>,
    /// Breathing preset (box, relaxing, energizing, calming, focus)
    #[arg(long, num_args = 0..=1, value_parser = parse_enum::<BreathingPreset>)]
    pub breathing: Option<Option<BreathingPreset>>,
    /// Target breathing length in seconds
    #[arg(long)]
    pub target: Option<u32>,
    /// slow, normal or fast
    #[arg(long, value_parser = parse_enum::<Pace>)]
    pub pace: Option<Pace>,
    /// full, light or silent
    #[arg(long, value_parser = parse_enum::<GuidanceStyle>)]
    pub style: Option<GuidanceStyle>,
}

/// Parse a lowercase enum name the same way activity files spell it.
pub fn parse_enum<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("unknown value '{value}'"))
}

impl ActivityArgs {
    pub fn resolve(&self, config: &Config) -> Result<ActivityConfig, Box<dyn std::error::Error>> {
        let defaults = &config.defaults;
        let activity = if let Some(path) = &self.file {
            load_activity(path)?
        } else if let Some(secs) = self.countdown {
            ActivityConfig::countdown(secs.unwrap_or(defaults.countdown_seconds))
        } else if let Some(minutes) = self.meditation {
            ActivityConfig::meditation(minutes.unwrap_or(defaults.meditation_minutes) * 60)
        } else if let Some(preset) = self.breathing {
            let target = self
                .target
                .or((defaults.breathing_target_seconds > 0).then_some(defaults.breathing_target_seconds));
            ActivityConfig::breathing(preset.unwrap_or(defaults.breathing_preset), target)
        } else {
            return Err("no activity given: use --file, --countdown, --meditation or --breathing".into());
        };

        let mut activity = config.apply_defaults(activity);
        if let Some(pace) = self.pace {
            activity.pace = pace;
        }
        if let Some(style) = self.style {
            activity.style = style;
        }
        Ok(activity)
    }
}

pub fn load_activity(path: &Path) -> Result<ActivityConfig, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let activity: ActivityConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    Ok(activity)
}
