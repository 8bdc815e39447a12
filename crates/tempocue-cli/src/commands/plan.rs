use clap::Args;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use tempocue_core::plan::{self, Cue};
use tempocue_core::Config;

use super::activity::ActivityArgs;
use super::format_clock;

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub activity: ActivityArgs,
    /// Seed for phrase selection, for reproducible plans
    #[arg(long)]
    pub seed: Option<u64>,
    /// Print one line per cue instead of JSON
    #[arg(long)]
    pub text: bool,
    /// Print the plan before the guidance style is applied
    #[arg(long)]
    pub unstyled: bool,
}

pub fn rng_for(seed: Option<u64>) -> Pcg64 {
    match seed {
        Some(seed) => Pcg64::seed_from_u64(seed),
        None => Pcg64::from_entropy(),
    }
}

fn cue_line(cue: &Cue) -> String {
    let kind = format!("{:?}", cue.kind).to_lowercase();
    format!("{}  {kind:<11} {}", format_clock(cue.timing_ms), cue.text)
}

pub fn run(args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let activity = args.activity.resolve(&config)?;
    let options = config.executor_settings().plan_options;
    let mut rng = rng_for(args.seed);

    let cues = if args.unstyled {
        plan::build_plan_with(&activity, options, &mut rng)
    } else {
        plan::build_styled_plan(&activity, options, &mut rng)
    };
    if cues.is_empty() {
        return Err("no cues could be built for this activity".into());
    }

    if args.text {
        for cue in &cues {
            println!("{}", cue_line(cue));
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&cues)?);
    }
    Ok(())
}
