//! Integration tests for the guidance executor.
//!
//! Every test drives the executor with a manual clock and polls `run_due`
//! the way the async driver does, so timings are exact.

use std::sync::Arc;

use rand::SeedableRng;
use rand_pcg::Pcg64;
use tempocue_core::events::{EventLog, GuidanceEvent, TimerControl};
use tempocue_core::guidance::{Deferred, ExecutorSettings, ExecutorStatus, GuidanceExecutor};
use tempocue_core::plan::{ActivityConfig, CueKind, Pace, Step};
use tempocue_core::ManualClock;

fn setup(config: ActivityConfig) -> (Arc<ManualClock>, GuidanceExecutor, EventLog) {
    let clock = Arc::new(ManualClock::new(0));
    let mut executor = GuidanceExecutor::new(clock.clone(), ExecutorSettings::default())
        .with_rng(Pcg64::seed_from_u64(42));
    let log = EventLog::new();
    executor.initialize(config, log.callbacks()).unwrap();
    (clock, executor, log)
}

/// Move the clock forward in 250 ms slices, polling after each one.
fn advance_to(clock: &ManualClock, executor: &mut GuidanceExecutor, target_ms: u64) {
    use tempocue_core::Clock;
    while clock.now_ms() < target_ms {
        let step = (target_ms - clock.now_ms()).min(250);
        clock.advance(step);
        executor.run_due();
    }
}

fn run_until_complete(clock: &ManualClock, executor: &mut GuidanceExecutor) {
    use tempocue_core::Clock;
    let limit = clock.now_ms() + 3_600_000;
    while executor.status() != ExecutorStatus::Completed && clock.now_ms() < limit {
        let target = clock.now_ms() + 1_000;
        advance_to(clock, executor, target);
    }
    assert_eq!(executor.status(), ExecutorStatus::Completed);
}

fn three_step_circuit() -> ActivityConfig {
    ActivityConfig::circuit(vec![
        Step::reps("Squats", 10),
        Step::reps("Lunges", 10),
        Step::timed("Plank", 30),
    ])
}

fn pending_cues(executor: &GuidanceExecutor) -> Vec<(usize, u64)> {
    let mut out: Vec<(usize, u64)> = executor
        .detailed_state()
        .timers
        .iter()
        .filter_map(|e| match e.deferred {
            Deferred::Cue { index } => Some((index, e.fire_at_ms)),
            _ => None,
        })
        .collect();
    out.sort();
    out
}

#[test]
fn test_circuit_fires_exactly_the_cues_due_after_45_seconds() {
    let (clock, mut executor, log) = setup(three_step_circuit());
    assert!(executor.start());
    advance_to(&clock, &mut executor, 45_000);

    let expected: Vec<String> = executor
        .plan()
        .iter()
        .filter(|c| c.timing_ms <= 45_000)
        .map(|c| c.text.clone())
        .collect();
    assert!(!expected.is_empty());
    assert_eq!(log.cue_texts(), expected);
    assert_eq!(executor.progress().next_cue_index, expected.len());
}

#[test]
fn test_full_circuit_runs_in_plan_order() {
    let (clock, mut executor, log) = setup(three_step_circuit());
    executor.start();
    run_until_complete(&clock, &mut executor);

    let plan: Vec<String> = executor.plan().iter().map(|c| c.text.clone()).collect();
    assert_eq!(log.cue_texts(), plan);

    let started: Vec<usize> = log
        .events()
        .iter()
        .filter_map(|e| match e {
            GuidanceEvent::StepStarted { step_index, .. } => Some(*step_index),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![0, 1, 2]);

    let summary = log
        .events()
        .into_iter()
        .find_map(|e| match e {
            GuidanceEvent::ActivityCompleted { summary } => Some(summary),
            _ => None,
        })
        .unwrap();
    assert_eq!(summary.completed_steps, vec!["Squats", "Lunges", "Plank"]);
    assert!(!summary.stopped_early);
}

#[test]
fn test_slow_pace_stretches_remaining_delays() {
    let (clock, mut executor, log) = setup(three_step_circuit());
    executor.start();
    advance_to(&clock, &mut executor, 20_000);
    let spoken_before = log.cue_texts();
    let before = pending_cues(&executor);
    assert!(!before.is_empty());

    assert!(executor.adjust_pace(Pace::Slow));
    assert!((executor.pace_multiplier() - 1.5).abs() < 1e-9);
    let after = pending_cues(&executor);
    assert_eq!(after.len(), before.len());
    for ((i, old), (j, new)) in before.iter().zip(after.iter()) {
        assert_eq!(i, j);
        let expected = (*old - 20_000) as f64 * 1.5;
        let actual = (*new - 20_000) as f64;
        assert!(
            (actual - expected).abs() <= 1.0,
            "cue {i}: delay {actual} ms, expected {expected} ms"
        );
    }
    assert_eq!(log.cue_texts(), spoken_before);

    run_until_complete(&clock, &mut executor);
    let plan: Vec<String> = executor.plan().iter().map(|c| c.text.clone()).collect();
    assert_eq!(log.cue_texts(), plan);
}

#[test]
fn test_pause_then_resume_keeps_elapsed() {
    let (clock, mut executor, log) = setup(three_step_circuit());
    executor.start();
    advance_to(&clock, &mut executor, 20_000);

    let elapsed = executor.progress().elapsed_ms;
    assert!(executor.pause());
    assert!(executor.resume());
    assert_eq!(executor.progress().elapsed_ms, elapsed);

    // A long pause delays the next cue by exactly the pause length.
    assert!(executor.pause());
    advance_to(&clock, &mut executor, 30_000);
    assert!(executor.progress().is_paused);
    assert_eq!(executor.progress().elapsed_ms, elapsed);
    assert!(executor.resume());
    log.take();

    let next = executor
        .plan()
        .iter()
        .find(|c| c.timing_ms > 20_000)
        .cloned()
        .unwrap();
    advance_to(&clock, &mut executor, next.timing_ms + 10_000 - 1);
    assert!(log.cues().is_empty());
    advance_to(&clock, &mut executor, next.timing_ms + 10_000);
    assert_eq!(log.cue_texts(), vec![next.text]);
}

#[test]
fn test_resume_resets_step_timer_to_remaining() {
    let (clock, mut executor, log) = setup(ActivityConfig::circuit(vec![Step::timed(
        "Plank", 30,
    )]));
    executor.start();
    // Go at 18 s, so 10 s into the hold.
    advance_to(&clock, &mut executor, 28_000);
    executor.pause();
    advance_to(&clock, &mut executor, 40_000);
    log.take();
    executor.resume();
    assert_eq!(
        log.timer_controls(),
        vec![TimerControl::Reset {
            remaining_ms: 20_000
        }]
    );
}

#[test]
fn test_skip_on_last_step_completes() {
    let (clock, mut executor, log) = setup(ActivityConfig::circuit(vec![Step::timed(
        "Plank", 30,
    )]));
    executor.start();
    advance_to(&clock, &mut executor, 10_000);

    assert!(executor.skip());
    assert_eq!(executor.status(), ExecutorStatus::Completed);
    assert_eq!(executor.progress().completed_steps, vec!["Plank"]);
    assert_eq!(
        log.count(|e| matches!(e, GuidanceEvent::ActivityCompleted { .. })),
        1
    );
    assert!(!executor.skip());
}

#[test]
fn test_skip_announces_next_step_with_countdown() {
    let (clock, mut executor, log) = setup(three_step_circuit());
    executor.start();
    advance_to(&clock, &mut executor, 25_000);
    log.take();

    assert!(executor.skip());
    assert_eq!(executor.progress().current_step_index, 1);
    assert_eq!(executor.progress().completed_steps, vec!["Squats"]);

    advance_to(&clock, &mut executor, 29_000);
    let texts = log.cue_texts();
    assert_eq!(texts.first().map(String::as_str), Some("Next up: Lunges."));
    assert_eq!(&texts[1..], &["3", "2", "1", "Go!"]);
    assert!(log
        .timer_controls()
        .iter()
        .any(|c| matches!(c, TimerControl::Start { .. })));
}

#[test]
fn test_pace_change_during_skip_countdown_keeps_go_first() {
    let (clock, mut executor, log) = setup(ActivityConfig::circuit(vec![
        Step::reps("Squats", 10),
        Step::timed("Plank", 30),
    ]));
    executor.start();
    advance_to(&clock, &mut executor, 20_000);
    log.take();
    assert!(executor.skip());

    assert!(executor.adjust_pace(Pace::Fast));
    advance_to(&clock, &mut executor, 30_000);

    let events = log.events();
    let go = events
        .iter()
        .position(|e| matches!(e, GuidanceEvent::CueFired { cue } if cue.text == "Go!"))
        .unwrap();
    let first_body = events
        .iter()
        .position(|e| {
            matches!(e, GuidanceEvent::CueFired { cue }
                if !["Next up: Plank.", "3", "2", "1", "Go!"].contains(&cue.text.as_str()))
        })
        .unwrap();
    let timer_start = events
        .iter()
        .position(|e| {
            matches!(
                e,
                GuidanceEvent::TimerControl {
                    control: TimerControl::Start { .. }
                }
            )
        })
        .unwrap();
    assert!(go < first_body, "{:?}", log.cue_texts());
    assert!(go <= timer_start);
    assert_eq!(
        &log.cue_texts()[..5],
        &["Next up: Plank.", "3", "2", "1", "Go!"]
    );
}

#[test]
fn test_go_back_on_first_step_changes_nothing() {
    let (clock, mut executor, log) = setup(three_step_circuit());
    executor.start();
    advance_to(&clock, &mut executor, 5_000);
    let before = executor.progress();
    let pending = pending_cues(&executor);

    assert!(!executor.go_back());
    let after = executor.progress();
    assert_eq!(after.current_step_index, 0);
    assert_eq!(after.next_cue_index, before.next_cue_index);
    assert_eq!(after.completed_steps, before.completed_steps);
    assert_eq!(pending_cues(&executor), pending);
    assert_eq!(
        log.cue_texts().last().map(String::as_str),
        Some("You're already on the first exercise.")
    );
}

#[test]
fn test_go_back_returns_to_previous_step() {
    let (clock, mut executor, _log) = setup(three_step_circuit());
    executor.start();
    advance_to(&clock, &mut executor, 10_000);
    executor.skip();
    assert_eq!(executor.progress().current_step_index, 1);

    assert!(executor.go_back());
    let progress = executor.progress();
    assert_eq!(progress.current_step_index, 0);
    assert!(progress.completed_steps.is_empty());
    assert_eq!(progress.current_step_name.as_deref(), Some("Squats"));
}

#[test]
fn test_ticks_from_other_source_are_dropped() {
    let (_clock, mut executor, log) = setup(ActivityConfig::meditation(300));
    executor.start();
    executor.update_progress_from_timer("ui", 1.0, 299.0, None);
    let index = executor.progress().next_cue_index;
    let spoken = log.cues().len();

    assert_eq!(
        executor.update_progress_from_timer("other", 200.0, 100.0, None),
        0
    );
    assert_eq!(executor.progress().next_cue_index, index);
    assert_eq!(log.cues().len(), spoken);

    assert!(executor.update_progress_from_timer("ui", 200.0, 100.0, None) > 0);
    assert!(executor.progress().next_cue_index > index);
}

#[test]
fn test_cancelled_timers_never_fire() {
    let (clock, mut executor, log) = setup(three_step_circuit());
    executor.start();
    advance_to(&clock, &mut executor, 10_000);
    assert!(executor.stop());
    let events = log.events().len();

    advance_to(&clock, &mut executor, 400_000);
    assert_eq!(executor.run_due(), 0);
    assert_eq!(log.events().len(), events);
    assert_eq!(executor.next_deadline_ms(), None);
    assert!(!executor.stop());

    let summary = log
        .events()
        .into_iter()
        .find_map(|e| match e {
            GuidanceEvent::ActivityCompleted { summary } => Some(summary),
            _ => None,
        })
        .unwrap();
    assert!(summary.stopped_early);
}

#[test]
fn test_reset_cancels_and_allows_restart() {
    let (clock, mut executor, log) = setup(three_step_circuit());
    executor.start();
    advance_to(&clock, &mut executor, 10_000);
    executor.reset();
    assert_eq!(executor.status(), ExecutorStatus::Idle);
    log.take();

    advance_to(&clock, &mut executor, 100_000);
    assert!(log.cues().is_empty());

    assert!(executor.start());
    let opening = executor.plan()[0].text.clone();
    assert_eq!(log.cue_texts(), vec![opening]);
}

#[test]
fn test_confirm_rep_beyond_target_adds_no_counts() {
    let (clock, mut executor, log) = setup(ActivityConfig::circuit(vec![
        Step::reps("Push-ups", 3),
        Step::timed("Plank", 20),
    ]));
    executor.start();
    advance_to(&clock, &mut executor, 18_000);

    for _ in 0..3 {
        clock.advance(500);
        assert!(executor.confirm_rep(None));
    }
    assert!(!executor.confirm_rep(None));
    assert!(!executor.confirm_rep(Some(4)));

    run_until_complete(&clock, &mut executor);
    let counts: Vec<String> = log
        .cues()
        .into_iter()
        .filter(|c| c.kind == CueKind::Count && c.step_index == Some(0))
        .map(|c| c.text)
        .collect();
    assert_eq!(counts, vec!["1", "2", "3"]);
    assert_eq!(executor.progress().completed_steps, vec!["Push-ups", "Plank"]);
}

#[test]
fn test_confirm_rep_ignored_outside_rep_steps() {
    let (clock, mut executor, _log) = setup(ActivityConfig::circuit(vec![Step::timed(
        "Plank", 30,
    )]));
    assert!(!executor.confirm_rep(None));
    executor.start();
    advance_to(&clock, &mut executor, 20_000);
    assert!(!executor.confirm_rep(None));

    let (_clock, mut countdown, _log) = setup(ActivityConfig::countdown(60));
    countdown.start();
    assert!(!countdown.confirm_rep(None));
}

#[test]
fn test_oversized_breathing_pattern_is_reported_not_built() {
    let config: ActivityConfig = serde_json::from_str(
        r#"{"kind":"breathing","pattern":{"name":"x","inhale_secs":1e20,"exhale_secs":4,"cycles":2},"target_duration_secs":60}"#,
    )
    .unwrap();
    let clock = Arc::new(ManualClock::new(0));
    let mut executor = GuidanceExecutor::new(clock, ExecutorSettings::default())
        .with_rng(Pcg64::seed_from_u64(42));
    let log = EventLog::new();

    let err = executor.initialize(config, log.callbacks()).unwrap_err();
    assert_eq!(err, tempocue_core::GuidanceError::PlanEmpty);
    assert_eq!(executor.status(), ExecutorStatus::Idle);
    assert_eq!(log.count(|e| matches!(e, GuidanceEvent::Error { .. })), 1);
}

fn light_meditation_tick(deep: bool) -> (GuidanceExecutor, EventLog) {
    let (_clock, mut executor, log) =
        setup(ActivityConfig::meditation(600).with_style(tempocue_core::GuidanceStyle::Light));
    executor.start();
    let phase = tempocue_core::PhaseInfo::new("deep", deep);
    executor.update_progress_from_timer("ui", 599.0, 1.0, Some(&phase));
    (executor, log)
}

#[test]
fn test_light_style_deep_phase_skips_motivation() {
    let (executor, log) = light_meditation_tick(true);
    let due: Vec<_> = executor
        .plan()
        .iter()
        .filter(|c| c.timing_ms <= 599_000)
        .cloned()
        .collect();
    assert!(due.iter().any(|c| c.kind == CueKind::Motivation));

    assert!(log.cues().iter().all(|c| c.kind != CueKind::Motivation));
    assert_eq!(executor.progress().next_cue_index, due.len());
    let expected: Vec<String> = due
        .iter()
        .filter(|c| c.kind != CueKind::Motivation)
        .map(|c| c.text.clone())
        .collect();
    assert_eq!(log.cue_texts(), expected);
}

#[test]
fn test_light_style_shallow_phase_keeps_motivation() {
    let (executor, log) = light_meditation_tick(false);
    let motivations = executor
        .plan()
        .iter()
        .filter(|c| c.timing_ms <= 599_000 && c.kind == CueKind::Motivation)
        .count();
    assert!(motivations > 0);
    assert_eq!(
        log.cues().iter().filter(|c| c.kind == CueKind::Motivation).count(),
        motivations
    );
}
