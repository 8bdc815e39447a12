//! Real-time guidance with keyboard controls.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tempocue_core::events::{EventHandler, GuidanceEvent};
use tempocue_core::guidance::{ExecutorStatus, GuidanceExecutor, TimingMode};
use tempocue_core::plan::Pace;
use tempocue_core::runtime::{GuidanceRuntime, SharedClockTicker};
use tempocue_core::{Config, SnapshotStore, SqliteSnapshotStore, TokioClock};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::activity::{parse_enum, ActivityArgs};
use super::describe_event;
use super::plan::rng_for;

const HELP: &str = "\
controls: <enter> rep done | p pause | c continue | s skip | b back
          slow/normal/fast pace | q quit | x save and exit";

#[derive(Args)]
pub struct GuideArgs {
    #[command(flatten)]
    pub activity: ActivityArgs,
    /// Seed for phrase selection; reuse it when resuming a session
    #[arg(long)]
    pub seed: Option<u64>,
    /// Resume or save under this session id; a new id is generated when
    /// the flag is given without a value
    #[arg(long, num_args = 0..=1)]
    pub session: Option<Option<String>>,
    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Rep,
    Pause,
    Resume,
    Skip,
    Back,
    Pace(Pace),
    Quit,
    Detach,
    Help,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "" => Some(Command::Rep),
        "p" | "pause" => Some(Command::Pause),
        "c" | "continue" | "resume" => Some(Command::Resume),
        "s" | "skip" => Some(Command::Skip),
        "b" | "back" => Some(Command::Back),
        "q" | "quit" => Some(Command::Quit),
        "x" | "exit" => Some(Command::Detach),
        "h" | "?" | "help" => Some(Command::Help),
        other => parse_enum::<Pace>(other).ok().map(Command::Pace),
    }
}

enum Outcome {
    Finished,
    Detached,
}

pub fn run(args: GuideArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let activity = args.activity.resolve(&config)?;

    let session = match &args.session {
        Some(Some(id)) => Some(id.clone()),
        Some(None) => Some(Uuid::new_v4().to_string()),
        None => None,
    };
    let store = match &session {
        Some(_) => Some(SqliteSnapshotStore::open(&config.snapshot_db_path()?)?),
        None => None,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let mut executor = GuidanceExecutor::new(Arc::new(TokioClock::new()), config.executor_settings())
            .with_rng(rng_for(args.seed));
        let json = args.json;
        executor.initialize(
            activity,
            Box::new(EventHandler(move |event: GuidanceEvent| print_event(&event, json))),
        )?;

        if let (Some(id), Some(store)) = (&session, &store) {
            if executor.restore_snapshot(store, id)? {
                tracing::info!(session_id = %id, "resumed saved session");
                eprintln!("resuming session {id}");
            } else {
                eprintln!("session {id}");
            }
        }

        let tick_driven = executor.timing_mode() == Some(TimingMode::TickDriven);
        let poll = Duration::from_millis(config.executor.poll_interval_ms);
        let runtime = GuidanceRuntime::spawn(executor, poll);
        let ticker = tick_driven.then(|| SharedClockTicker::spawn(&runtime, poll));

        runtime.with(|e| match e.status() {
            ExecutorStatus::Paused => e.resume(),
            _ => e.start(),
        });
        eprintln!("{HELP}");

        let outcome = drive_input(&runtime).await;

        if let Some(ticker) = ticker {
            ticker.stop();
        }
        if let (Some(id), Some(store)) = (&session, &store) {
            match outcome {
                Outcome::Detached => {
                    runtime.with(|e| e.save_snapshot(store, id))?;
                    eprintln!("saved session {id}");
                }
                Outcome::Finished => store.remove(id)?,
            }
        }
        runtime.shutdown();
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

async fn drive_input(runtime: &GuidanceRuntime) -> Outcome {
    let (tx, mut rx) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let mut input_open = true;
    loop {
        tokio::select! {
            _ = runtime.wait_for_completion() => return Outcome::Finished,
            line = rx.recv(), if input_open => {
                let Some(line) = line else {
                    tracing::debug!("stdin closed, running to completion");
                    input_open = false;
                    continue;
                };
                match parse_command(&line) {
                    Some(Command::Rep) => { runtime.with(|e| e.confirm_rep(None)); }
                    Some(Command::Pause) => { runtime.with(|e| e.pause()); }
                    Some(Command::Resume) => { runtime.with(|e| e.resume()); }
                    Some(Command::Skip) => { runtime.with(|e| e.skip()); }
                    Some(Command::Back) => { runtime.with(|e| e.go_back()); }
                    Some(Command::Pace(pace)) => { runtime.with(|e| e.adjust_pace(pace)); }
                    Some(Command::Quit) => {
                        runtime.with(|e| e.stop());
                        return Outcome::Finished;
                    }
                    Some(Command::Detach) => {
                        runtime.with(|e| e.pause());
                        return Outcome::Detached;
                    }
                    Some(Command::Help) => eprintln!("{HELP}"),
                    None => eprintln!("unknown command '{}'", line.trim()),
                }
            }
        }
    }
}

fn print_event(event: &GuidanceEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to encode event"),
        }
        return;
    }
    if let Some(line) = describe_event(event) {
        println!("[{}] {line}", chrono::Local::now().format("%H:%M:%S"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse() {
        assert_eq!(parse_command(""), Some(Command::Rep));
        assert_eq!(parse_command("  p "), Some(Command::Pause));
        assert_eq!(parse_command("c"), Some(Command::Resume));
        assert_eq!(parse_command("Fast"), Some(Command::Pace(Pace::Fast)));
        assert_eq!(parse_command("x"), Some(Command::Detach));
        assert_eq!(parse_command("jump"), None);
    }
}
