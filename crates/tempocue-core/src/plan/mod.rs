//! Cue plan builders.
//!
//! A plan is an ordered list of [`Cue`]s produced from an
//! [`ActivityConfig`]. Building is pure apart from the phrase variant
//! choice, which draws from the random source handed in by the caller.

mod activity;
pub mod breathing;
pub mod circuit;
mod countdown;
mod cue;
pub mod meditation;
pub mod phrases;
mod style;

use rand::RngCore;

pub use activity::{
    Activity, ActivityConfig, ActivityKind, BreathPhase, BreathingPattern, BreathingPreset,
    GuidanceStyle, Pace, PatternChoice, Step, StepMode,
};
pub use cue::{Cue, CueKind, CueMarker, CuePriority};
pub(crate) use cue::push_countdown;
pub use style::apply_style;

/// Builder knobs that come from configuration rather than the activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub max_breathing_cycles: u32,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            max_breathing_cycles: breathing::DEFAULT_MAX_CYCLES,
        }
    }
}

/// Build the unfiltered plan for `config`.
pub fn build_plan<R: RngCore + ?Sized>(config: &ActivityConfig, rng: &mut R) -> Vec<Cue> {
    build_plan_with(config, PlanOptions::default(), rng)
}

pub fn build_plan_with<R: RngCore + ?Sized>(
    config: &ActivityConfig,
    options: PlanOptions,
    rng: &mut R,
) -> Vec<Cue> {
    match &config.activity {
        Activity::Circuit { steps } => circuit::build(steps, false, rng),
        Activity::Stretching { steps } => circuit::build(steps, true, rng),
        Activity::Breathing {
            pattern,
            target_duration_secs,
        } => breathing::build(
            &pattern.resolve(),
            *target_duration_secs,
            config.pace,
            options.max_breathing_cycles,
            rng,
        ),
        Activity::Meditation { duration_secs } => meditation::build(*duration_secs, rng),
        Activity::Countdown { duration_secs } => countdown::build(*duration_secs),
    }
}

/// Build a plan and apply the config's guidance style.
pub fn build_styled_plan<R: RngCore + ?Sized>(
    config: &ActivityConfig,
    options: PlanOptions,
    rng: &mut R,
) -> Vec<Cue> {
    apply_style(&build_plan_with(config, options, rng), config.style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn same_seed_same_plan() {
        let config = ActivityConfig::circuit(vec![
            Step::reps("Squats", 8).with_rest(20),
            Step::timed("Plank", 30),
        ]);
        let a = build_plan(&config, &mut Pcg64::seed_from_u64(11));
        let b = build_plan(&config, &mut Pcg64::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn every_family_builds_a_completion() {
        let configs = [
            ActivityConfig::circuit(vec![Step::reps("Squats", 3)]),
            ActivityConfig::new(Activity::Stretching {
                steps: vec![Step::timed("Hamstrings", 30)],
            }),
            ActivityConfig::breathing(BreathingPreset::Focus, Some(120)),
            ActivityConfig::meditation(300),
            ActivityConfig::countdown(90),
        ];
        for config in &configs {
            let plan = build_plan(config, &mut Pcg64::seed_from_u64(1));
            assert_eq!(
                plan.iter().filter(|c| c.kind == CueKind::Completion).count(),
                1,
                "{:?}",
                config.kind()
            );
        }
    }

    #[test]
    fn styled_plan_filters() {
        let config = ActivityConfig::countdown(300).with_style(GuidanceStyle::Silent);
        let plan = build_styled_plan(&config, PlanOptions::default(), &mut Pcg64::seed_from_u64(1));
        assert_eq!(plan.len(), 2);
    }
}
