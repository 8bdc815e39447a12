//! Fast-forward an activity on a manual clock.

use std::sync::Arc;

use clap::Args;
use tempocue_core::events::EventLog;
use tempocue_core::guidance::{ExecutorStatus, GuidanceExecutor, TimingMode};
use tempocue_core::plan::Pace;
use tempocue_core::{Clock, Config, ManualClock};

use super::activity::{parse_enum, ActivityArgs};
use super::plan::rng_for;
use super::{describe_event, format_clock};

const SOURCE_ID: &str = "simulate";
const MAX_SIMULATED_MS: u64 = 6 * 3_600_000;

#[derive(Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub activity: ActivityArgs,
    /// Seed for phrase selection
    #[arg(long)]
    pub seed: Option<u64>,
    /// Stop after this many seconds of activity time
    #[arg(long)]
    pub until: Option<u32>,
    /// Clock resolution in milliseconds
    #[arg(long, default_value_t = 100)]
    pub step_ms: u64,
    /// Change pace at the given second, e.g. "30:slow"
    #[arg(long, value_parser = parse_pace_change)]
    pub pace_at: Vec<(u64, Pace)>,
    /// Print events as JSON lines, including progress updates
    #[arg(long)]
    pub json: bool,
}

fn parse_pace_change(value: &str) -> Result<(u64, Pace), String> {
    let (at, pace) = value
        .split_once(':')
        .ok_or_else(|| format!("expected SECONDS:PACE, got '{value}'"))?;
    let secs: u64 = at
        .trim()
        .parse()
        .map_err(|_| format!("invalid seconds '{at}'"))?;
    Ok((secs * 1_000, parse_enum(pace.trim())?))
}

struct Simulation {
    clock: Arc<ManualClock>,
    executor: GuidanceExecutor,
    log: EventLog,
    step_ms: u64,
}

impl Simulation {
    /// Advance one clock step. Tick-driven activities get a shared-clock
    /// tick; self-scheduled ones are polled.
    fn step(&mut self) {
        self.clock.advance(self.step_ms);
        match self.executor.timing_mode() {
            Some(TimingMode::TickDriven) => {
                let elapsed_ms = self.executor.elapsed_ms();
                let plan_end = self.executor.plan().iter().map(|c| c.timing_ms).max().unwrap_or(0);
                let total_ms = plan_end as f64 * self.executor.pace_multiplier();
                let remaining_ms = (total_ms - elapsed_ms as f64).max(0.0);
                self.executor.update_progress_from_timer(
                    SOURCE_ID,
                    elapsed_ms as f64 / 1_000.0,
                    remaining_ms / 1_000.0,
                    None,
                );
                self.executor.run_due();
            }
            _ => {
                self.executor.run_due();
            }
        }
    }
}

pub fn run(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let activity = args.activity.resolve(&config)?;

    let clock = Arc::new(ManualClock::new(0));
    let mut executor = GuidanceExecutor::new(clock.clone(), config.executor_settings())
        .with_rng(rng_for(args.seed));
    let log = EventLog::new();
    executor.initialize(activity, log.callbacks())?;

    let mut sim = Simulation {
        clock,
        executor,
        log,
        step_ms: args.step_ms.max(1),
    };
    let limit_ms = args
        .until
        .map(|secs| u64::from(secs) * 1_000)
        .unwrap_or(MAX_SIMULATED_MS);
    let mut pace_changes = args.pace_at.clone();
    pace_changes.sort_by_key(|(at, _)| *at);
    let mut pace_changes = pace_changes.into_iter().peekable();

    sim.executor.start();
    print_events(&sim, args.json)?;
    while sim.executor.status() != ExecutorStatus::Completed && sim.clock.now_ms() < limit_ms {
        sim.step();
        while let Some((_, pace)) = pace_changes.next_if(|(at, _)| *at <= sim.clock.now_ms()) {
            sim.executor.adjust_pace(pace);
        }
        print_events(&sim, args.json)?;
    }

    if sim.executor.status() != ExecutorStatus::Completed {
        tracing::info!(limit_ms, "simulation stopped at time limit");
        sim.executor.stop();
        print_events(&sim, args.json)?;
    }
    Ok(())
}

fn print_events(sim: &Simulation, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let now = sim.clock.now_ms();
    for event in sim.log.take() {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }
        if let Some(line) = describe_event(&event) {
            println!("[{}] {line}", format_clock(now));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pace_change_parses_seconds_and_name() {
        assert_eq!(parse_pace_change("30:slow"), Ok((30_000, Pace::Slow)));
        assert_eq!(parse_pace_change(" 5 : Fast"), Ok((5_000, Pace::Fast)));
        assert!(parse_pace_change("30").is_err());
        assert!(parse_pace_change("x:slow").is_err());
        assert!(parse_pace_change("30:sprint").is_err());
    }
}
