//! Circuit and stretching plans.
//!
//! Timings are authored at pace x1.0; the executor applies the pace
//! multiplier when it schedules each cue.

use rand::RngCore;

use super::activity::{Step, StepMode};
use super::cue::{push_countdown, sort_plan, Cue, CueKind, CueMarker};
use super::phrases::{self, pick, spoken_duration};

pub const OPENING_MS: u64 = 5_000;
pub const TRANSITION_MS: u64 = 3_000;
pub const FORM_MS: u64 = 5_000;
pub const GET_SET_MS: u64 = 2_000;
pub const REP_INTERVAL_MS: u64 = 3_000;
pub const MANUAL_WINDOW_MS: u64 = 30_000;
pub const REST_LEAD_MS: u64 = 1_500;
pub const STEP_GAP_MS: u64 = 1_000;
pub const START_COUNTDOWN: [&str; 4] = ["3", "2", "1", "Go!"];
const FINAL_COUNTDOWN: [&str; 5] = ["5", "4", "3", "2", "1"];

pub(crate) fn build<R: RngCore + ?Sized>(steps: &[Step], stretching: bool, rng: &mut R) -> Vec<Cue> {
    if steps.is_empty() {
        return Vec::new();
    }
    let total = steps.len();
    let mut cues = Vec::new();

    let opening = if stretching {
        format!("Let's begin your stretching routine. {total} stretches today.")
    } else {
        format!("Let's get started! {total} exercises today.")
    };
    cues.push(Cue::new(0, CueKind::Instruction, opening).immediate());

    let mut t = OPENING_MS;
    for (i, step) in steps.iter().enumerate() {
        t = push_step(&mut cues, t, i, total, step, stretching, rng);
        t += STEP_GAP_MS;
    }

    let noun = if stretching { "stretches" } else { "exercises" };
    cues.push(Cue::new(
        t + STEP_GAP_MS,
        CueKind::Completion,
        format!("Workout complete! You finished all {total} {noun}."),
    ));

    sort_plan(&mut cues);
    cues
}

/// Lay out one step starting at `t`. Returns the end of its last segment.
fn push_step<R: RngCore + ?Sized>(
    cues: &mut Vec<Cue>,
    mut t: u64,
    i: usize,
    total: usize,
    step: &Step,
    stretching: bool,
    rng: &mut R,
) -> u64 {
    let transition = if i + 1 == total {
        format!("Final step! {}.", step.name)
    } else {
        format!("Next up: {}, step {} of {}.", step.name, i + 1, total)
    };
    cues.push(Cue::new(t, CueKind::Transition, transition).for_step(i));
    t += TRANSITION_MS;

    let form = match &step.instruction {
        Some(text) => text.clone(),
        None if stretching => pick(rng, phrases::FORM_STRETCHING).to_string(),
        None => pick(rng, phrases::FORM_CIRCUIT).to_string(),
    };
    cues.push(Cue::new(t, CueKind::Instruction, form).for_step(i));
    t += FORM_MS;

    cues.push(Cue::new(t, CueKind::Instruction, pick(rng, phrases::GET_SET)).for_step(i));
    t += GET_SET_MS;

    let go = push_countdown(cues, t, &START_COUNTDOWN, Some(i));
    if let Some(last) = cues.last_mut() {
        last.marker = Some(CueMarker::StepGo);
    }

    let done_at = match step.mode() {
        StepMode::Reps(reps) => push_reps(cues, go, i, reps, rng),
        StepMode::Timed(secs) => push_hold(cues, go, i, secs, stretching, rng),
        StepMode::Manual => {
            cues.push(
                Cue::new(
                    go + 1_000,
                    CueKind::Instruction,
                    "Take your time. Skip ahead when you're done.",
                )
                .for_step(i),
            );
            go + MANUAL_WINDOW_MS
        }
    };

    cues.push(
        Cue::new(
            done_at,
            CueKind::Motivation,
            format!("{} {} complete.", pick(rng, phrases::STEP_DONE), step.name),
        )
        .for_step(i)
        .marked(CueMarker::StepDone),
    );

    let rest = step.rest_secs();
    if rest == 0 || i + 1 == total {
        return done_at;
    }
    push_rest(cues, done_at + REST_LEAD_MS, i, rest, rng)
}

fn push_reps<R: RngCore + ?Sized>(
    cues: &mut Vec<Cue>,
    go: u64,
    i: usize,
    reps: u32,
    rng: &mut R,
) -> u64 {
    let midpoint = reps.div_ceil(2);
    for k in 1..=reps {
        let at = go + u64::from(k) * REP_INTERVAL_MS;
        cues.push(
            Cue::new(at, CueKind::Count, k.to_string())
                .for_step(i)
                .marked(CueMarker::Rep(k)),
        );

        let variants = if k == reps {
            Some(phrases::LAST_REP)
        } else if reps >= 3 && k == reps - 2 {
            Some(phrases::TWO_LEFT)
        } else if k == midpoint {
            Some(phrases::MIDPOINT_REP)
        } else if k == 3 {
            Some(phrases::THIRD_REP)
        } else {
            None
        };
        if let Some(variants) = variants {
            cues.push(
                Cue::new(at + REP_INTERVAL_MS / 2, CueKind::Motivation, pick(rng, variants))
                    .for_step(i),
            );
        }
    }
    go + u64::from(reps + 1) * REP_INTERVAL_MS
}

fn push_hold<R: RngCore + ?Sized>(
    cues: &mut Vec<Cue>,
    go: u64,
    i: usize,
    secs: u32,
    stretching: bool,
    rng: &mut R,
) -> u64 {
    let total_ms = u64::from(secs) * 1_000;
    let verb = if stretching { "Hold the stretch" } else { "Hold" };
    cues.push(
        Cue::new(
            go + 1_000,
            CueKind::Instruction,
            format!("{verb} for {}.", spoken_duration(secs)),
        )
        .for_step(i),
    );
    if secs >= 20 {
        cues.push(
            Cue::new(go + total_ms / 4, CueKind::Motivation, pick(rng, phrases::HOLD_QUARTER))
                .for_step(i),
        );
    }
    if secs >= 12 {
        cues.push(
            Cue::new(go + total_ms / 2, CueKind::Motivation, pick(rng, phrases::HOLD_HALF))
                .for_step(i),
        );
    }
    if secs >= 10 {
        push_countdown(cues, go + total_ms - 5_000, &FINAL_COUNTDOWN, Some(i));
    }
    go + total_ms
}

fn push_rest<R: RngCore + ?Sized>(
    cues: &mut Vec<Cue>,
    start: u64,
    i: usize,
    secs: u32,
    rng: &mut R,
) -> u64 {
    let total_ms = u64::from(secs) * 1_000;
    cues.push(
        Cue::new(
            start,
            CueKind::Rest,
            format!("Rest for {}.", spoken_duration(secs)),
        )
        .for_step(i)
        .marked(CueMarker::RestStart { seconds: secs }),
    );
    if secs >= 2 {
        cues.push(
            Cue::new(start + total_ms / 2, CueKind::Motivation, pick(rng, phrases::REST_MIDPOINT))
                .for_step(i),
        );
    }
    if secs >= 15 {
        cues.push(
            Cue::new(start + total_ms - 10_000, CueKind::Rest, "Ten seconds.").for_step(i),
        );
        push_countdown(cues, start + total_ms - 5_000, &FINAL_COUNTDOWN, Some(i));
    }
    start + total_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn rng() -> Pcg64 {
        Pcg64::seed_from_u64(1)
    }

    fn step_cues(cues: &[Cue], i: usize) -> Vec<&Cue> {
        cues.iter().filter(|c| c.step_index == Some(i)).collect()
    }

    #[test]
    fn rep_step_has_exactly_target_counts_before_completion() {
        let cues = build(&[Step::reps("Squats", 10)], false, &mut rng());
        let step = step_cues(&cues, 0);
        let done = step
            .iter()
            .position(|c| c.marker == Some(CueMarker::StepDone))
            .unwrap();
        let counts = step[..done]
            .iter()
            .filter(|c| c.kind == CueKind::Count)
            .count();
        assert_eq!(counts, 10);
    }

    #[test]
    fn start_countdown_is_four_cues_one_second_apart() {
        let cues = build(&[Step::reps("Squats", 5)], false, &mut rng());
        let tokens: Vec<_> = cues.iter().filter(|c| c.is_countdown()).collect();
        let texts: Vec<_> = tokens.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["3", "2", "1", "Go!"]);
        for pair in tokens.windows(2) {
            assert_eq!(pair[1].timing_ms - pair[0].timing_ms, 1_000);
        }
        assert_eq!(tokens[3].marker, Some(CueMarker::StepGo));
    }

    #[test]
    fn motivations_land_on_third_mid_two_left_and_last() {
        let cues = build(&[Step::reps("Lunges", 10)], false, &mut rng());
        let go = cues
            .iter()
            .find(|c| c.marker == Some(CueMarker::StepGo))
            .unwrap()
            .timing_ms;
        let mut reps: Vec<u64> = cues
            .iter()
            .filter(|c| c.kind == CueKind::Motivation && c.marker.is_none())
            .map(|c| (c.timing_ms - go - REP_INTERVAL_MS / 2) / REP_INTERVAL_MS)
            .collect();
        reps.sort_unstable();
        assert_eq!(reps, vec![3, 5, 8, 10]);
    }

    #[test]
    fn single_step_is_announced_as_final() {
        let cues = build(&[Step::timed("Plank", 30)], false, &mut rng());
        let transition = cues.iter().find(|c| c.kind == CueKind::Transition).unwrap();
        assert_eq!(transition.text, "Final step! Plank.");
    }

    #[test]
    fn final_step_transition_and_no_trailing_rest() {
        let steps = vec![
            Step::reps("Squats", 3).with_rest(20),
            Step::timed("Plank", 30).with_rest(20),
        ];
        let cues = build(&steps, false, &mut rng());
        assert!(cues
            .iter()
            .any(|c| c.kind == CueKind::Transition && c.text.starts_with("Final step!")));
        let rests = cues
            .iter()
            .filter(|c| matches!(c.marker, Some(CueMarker::RestStart { .. })))
            .count();
        assert_eq!(rests, 1);
        assert_eq!(
            cues.iter().filter(|c| c.kind == CueKind::Completion).count(),
            1
        );
        assert_eq!(cues.last().unwrap().kind, CueKind::Completion);
    }

    #[test]
    fn long_rest_gets_warning_and_five_second_countdown() {
        let steps = vec![Step::reps("A", 2).with_rest(30), Step::reps("B", 2)];
        let cues = build(&steps, false, &mut rng());
        let rest = cues
            .iter()
            .find(|c| matches!(c.marker, Some(CueMarker::RestStart { .. })))
            .unwrap()
            .timing_ms;
        assert!(cues
            .iter()
            .any(|c| c.text == "Ten seconds." && c.timing_ms == rest + 20_000));
        let countdown: Vec<_> = cues
            .iter()
            .filter(|c| c.is_countdown() && c.step_index == Some(0) && c.timing_ms > rest)
            .map(|c| c.timing_ms - rest)
            .collect();
        assert_eq!(countdown, vec![25_000, 26_000, 27_000, 28_000, 29_000]);
    }

    #[test]
    fn timed_step_checkins_and_countdown() {
        let cues = build(&[Step::timed("Plank", 40)], false, &mut rng());
        let go = cues
            .iter()
            .find(|c| c.marker == Some(CueMarker::StepGo))
            .unwrap()
            .timing_ms;
        let done = cues
            .iter()
            .find(|c| c.marker == Some(CueMarker::StepDone))
            .unwrap()
            .timing_ms;
        assert_eq!(done - go, 40_000);
        let motivations: Vec<_> = cues
            .iter()
            .filter(|c| c.kind == CueKind::Motivation && c.marker.is_none())
            .map(|c| c.timing_ms - go)
            .collect();
        assert_eq!(motivations, vec![10_000, 20_000]);
        let final_countdown = cues
            .iter()
            .filter(|c| c.marker == Some(CueMarker::Countdown) && c.timing_ms > go)
            .count();
        assert_eq!(final_countdown, 5);
    }

    #[test]
    fn plan_is_monotonic() {
        let steps = vec![
            Step::reps("A", 12).with_rest(15),
            Step::timed("B", 25).with_rest(45),
            Step::manual("C"),
        ];
        let cues = build(&steps, true, &mut rng());
        assert!(cues.windows(2).all(|w| w[0].timing_ms <= w[1].timing_ms));
    }

    #[test]
    fn empty_steps_build_nothing() {
        assert!(build(&[], false, &mut rng()).is_empty());
    }
}
