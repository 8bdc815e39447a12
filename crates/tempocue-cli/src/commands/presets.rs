use clap::Args;
use serde::Serialize;
use tempocue_core::plan::{breathing, BreathingPattern, BreathingPreset, Pace};

use super::format_clock;

#[derive(Args)]
pub struct PresetsArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PresetInfo {
    key: BreathingPreset,
    pattern: BreathingPattern,
    estimated_ms: u64,
}

fn rhythm(pattern: &BreathingPattern) -> String {
    [
        pattern.inhale_secs,
        pattern.hold_secs,
        pattern.exhale_secs,
        pattern.hold_empty_secs,
    ]
    .iter()
    .map(|secs| secs.to_string())
    .collect::<Vec<_>>()
    .join("-")
}

pub fn run(args: PresetsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let presets: Vec<PresetInfo> = BreathingPreset::ALL
        .iter()
        .map(|&key| {
            let pattern = key.pattern();
            let estimated_ms = breathing::estimated_total_ms(&pattern, Pace::Normal, pattern.cycles);
            PresetInfo {
                key,
                pattern,
                estimated_ms,
            }
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&presets)?);
        return Ok(());
    }
    for p in &presets {
        let key = serde_json::to_value(p.key)?;
        println!(
            "{:<11} {:<24} {:<9} {:>2} cycles  ~{}",
            key.as_str().unwrap_or_default(),
            p.pattern.name,
            rhythm(&p.pattern),
            p.pattern.cycles,
            format_clock(p.estimated_ms)
        );
    }
    Ok(())
}
