//! Breathing plans.
//!
//! Segment lengths are scaled by pace at build time. When a target
//! duration is given, the cycle count is fitted to it and the finished
//! plan is linearly rescaled once so its final cue lands on the target.

use rand::RngCore;

use super::activity::{BreathPhase, BreathingPattern, Pace};
use super::cue::{rescale_to, Cue, CueKind};
use super::phrases::{self, pick};

pub const OPENING_MS: u64 = 13_000;
pub const CLOSING_MS: u64 = 9_000;
pub const PROMPT_GAP_MS: u64 = 500;
pub const DEFAULT_MAX_CYCLES: u32 = 60;
/// Longest single inhale, hold or exhale a pattern may ask for.
pub const MAX_SEGMENT_SECS: f64 = 600.0;

fn segment_ms(secs: f64, pace: Pace) -> u64 {
    (secs * 1_000.0 * pace.multiplier()).round() as u64
}

/// Estimated wall-clock cost of one cycle, including prompt gaps.
pub fn cycle_cost_ms(pattern: &BreathingPattern, pace: Pace) -> u64 {
    pattern
        .segments()
        .iter()
        .map(|(_, secs)| segment_ms(*secs, pace).saturating_add(PROMPT_GAP_MS))
        .fold(0, u64::saturating_add)
}

/// Estimated total length of a session with `cycles` rounds.
pub fn estimated_total_ms(pattern: &BreathingPattern, pace: Pace, cycles: u32) -> u64 {
    u64::from(cycles)
        .saturating_mul(cycle_cost_ms(pattern, pace))
        .saturating_add(OPENING_MS + CLOSING_MS)
}

/// Every segment is a finite length no longer than [`MAX_SEGMENT_SECS`].
pub fn is_valid(pattern: &BreathingPattern) -> bool {
    [
        pattern.inhale_secs,
        pattern.hold_secs,
        pattern.exhale_secs,
        pattern.hold_empty_secs,
    ]
    .iter()
    .all(|secs| secs.is_finite() && *secs <= MAX_SEGMENT_SECS)
}

/// Cycle count whose estimated duration is closest to `target_secs`.
/// Ties resolve to fewer cycles.
pub fn best_cycle_count(
    pattern: &BreathingPattern,
    pace: Pace,
    target_secs: u32,
    max_cycles: u32,
) -> u32 {
    let target = u64::from(target_secs) * 1_000;
    (1..=max_cycles.max(1))
        .min_by_key(|&c| estimated_total_ms(pattern, pace, c).abs_diff(target))
        .unwrap_or(1)
}

pub(crate) fn build<R: RngCore + ?Sized>(
    pattern: &BreathingPattern,
    target_secs: Option<u32>,
    pace: Pace,
    max_cycles: u32,
    rng: &mut R,
) -> Vec<Cue> {
    let segments = pattern.segments();
    if segments.is_empty() || !is_valid(pattern) {
        tracing::warn!(pattern = %pattern.name, "breathing pattern rejected");
        return Vec::new();
    }
    let cycles = match target_secs {
        Some(target) if target > 0 => best_cycle_count(pattern, pace, target, max_cycles),
        _ => pattern.cycles.clamp(1, max_cycles.max(1)),
    };

    let mut cues = vec![
        Cue::new(
            0,
            CueKind::Instruction,
            format!("Let's begin {}. Find a comfortable position.", pattern.name),
        )
        .immediate(),
        Cue::new(5_000, CueKind::Instruction, "Relax your shoulders and soften your gaze."),
        Cue::new(
            9_000,
            CueKind::Instruction,
            format!("We'll breathe together for {cycles} rounds. Follow my voice."),
        ),
    ];

    let mut t = OPENING_MS;
    for cycle in 0..cycles {
        for (phase, secs) in &segments {
            cues.push(prompt(*phase, *secs, cycle, cycles, t, rng));
            t += segment_ms(*secs, pace) + PROMPT_GAP_MS;
        }
    }

    cues.push(Cue::new(
        t,
        CueKind::Instruction,
        "Let your breath return to its natural rhythm.",
    ));
    cues.push(Cue::new(t + 5_000, CueKind::Instruction, "Notice how you feel."));
    cues.push(Cue::new(
        t + CLOSING_MS,
        CueKind::Completion,
        "Breathing session complete. Well done.",
    ));

    if let Some(target) = target_secs.filter(|t| *t > 0) {
        rescale_to(&mut cues, u64::from(target) * 1_000);
    }
    cues
}

fn prompt<R: RngCore + ?Sized>(
    phase: BreathPhase,
    secs: f64,
    cycle: u32,
    cycles: u32,
    at: u64,
    rng: &mut R,
) -> Cue {
    let counts = secs.round() as u32;
    let first = cycle == 0;
    let last = cycles >= 2 && cycle + 1 == cycles;
    let middle = cycles >= 3 && cycle == cycles / 2;

    let (kind, text) = match phase {
        BreathPhase::Inhale if first => (
            CueKind::Instruction,
            format!("Breathe in slowly through your nose for {counts}."),
        ),
        BreathPhase::Inhale if last => (
            CueKind::Instruction,
            "Last round. Breathe in deeply.".to_string(),
        ),
        BreathPhase::Inhale if middle => (
            CueKind::Motivation,
            "Halfway there. Breathe in.".to_string(),
        ),
        BreathPhase::Inhale => (CueKind::Instruction, pick(rng, phrases::INHALE).to_string()),
        BreathPhase::Hold if first => (CueKind::Instruction, format!("Hold for {counts}.")),
        BreathPhase::Hold => (CueKind::Instruction, pick(rng, phrases::HOLD).to_string()),
        BreathPhase::Exhale if first => (
            CueKind::Instruction,
            format!("Breathe out gently for {counts}."),
        ),
        BreathPhase::Exhale if last => (
            CueKind::Instruction,
            "And let it all go.".to_string(),
        ),
        BreathPhase::Exhale => (CueKind::Instruction, pick(rng, phrases::EXHALE).to_string()),
        BreathPhase::HoldEmpty if first => (
            CueKind::Instruction,
            format!("Rest empty for {counts}."),
        ),
        BreathPhase::HoldEmpty => (
            CueKind::Instruction,
            pick(rng, phrases::HOLD_EMPTY).to_string(),
        ),
    };
    let cue = Cue::new(at, kind, text);
    if phase == BreathPhase::Inhale {
        cue.immediate()
    } else {
        cue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::activity::BreathingPreset;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn box_cycle_cost() {
        let pattern = BreathingPreset::Box.pattern();
        assert_eq!(cycle_cost_ms(&pattern, Pace::Normal), 4 * 4_500);
        assert_eq!(cycle_cost_ms(&pattern, Pace::Slow), 4 * 6_500);
    }

    #[test]
    fn box_sixty_seconds_fits_two_cycles_and_lands_on_target() {
        let pattern = BreathingPreset::Box.pattern();
        assert_eq!(best_cycle_count(&pattern, Pace::Normal, 60, 60), 2);
        let cues = build(&pattern, Some(60), Pace::Normal, 60, &mut Pcg64::seed_from_u64(3));
        let max = cues.iter().map(|c| c.timing_ms).max().unwrap();
        assert_eq!(max, 60_000);
        assert_eq!(cues.last().unwrap().kind, CueKind::Completion);
    }

    #[test]
    fn slower_pace_fits_fewer_cycles() {
        let pattern = BreathingPreset::Calming.pattern();
        let normal = best_cycle_count(&pattern, Pace::Normal, 300, 60);
        let slow = best_cycle_count(&pattern, Pace::Slow, 300, 60);
        assert!(slow < normal);
    }

    #[test]
    fn search_is_bounded() {
        let pattern = BreathingPreset::Energizing.pattern();
        assert_eq!(best_cycle_count(&pattern, Pace::Fast, 24 * 3_600, 60), 60);
    }

    #[test]
    fn without_target_uses_pattern_cycles() {
        let pattern = BreathingPreset::Relaxing.pattern();
        let cues = build(&pattern, None, Pace::Normal, 60, &mut Pcg64::seed_from_u64(3));
        // 3 opening + 4 cycles x 3 prompts + 3 closing
        assert_eq!(cues.len(), 3 + 12 + 3);
        let expected = estimated_total_ms(&pattern, Pace::Normal, 4);
        assert_eq!(cues.last().unwrap().timing_ms, expected);
    }

    #[test]
    fn empty_pattern_builds_nothing() {
        let pattern = BreathingPattern {
            name: "none".into(),
            inhale_secs: 0.0,
            hold_secs: 0.0,
            exhale_secs: 0.0,
            hold_empty_secs: 0.0,
            cycles: 3,
        };
        let cues = build(&pattern, None, Pace::Normal, 60, &mut Pcg64::seed_from_u64(3));
        assert!(cues.is_empty());
    }

    #[test]
    fn oversized_segment_builds_nothing() {
        let pattern = BreathingPattern {
            name: "x".into(),
            inhale_secs: 1e20,
            hold_secs: 0.0,
            exhale_secs: 4.0,
            hold_empty_secs: 0.0,
            cycles: 2,
        };
        assert!(!is_valid(&pattern));
        assert_eq!(cycle_cost_ms(&pattern, Pace::Slow), u64::MAX);
        let cues = build(&pattern, Some(60), Pace::Normal, 60, &mut Pcg64::seed_from_u64(3));
        assert!(cues.is_empty());

        let infinite = BreathingPattern {
            exhale_secs: f64::INFINITY,
            inhale_secs: 4.0,
            ..pattern
        };
        assert!(build(&infinite, None, Pace::Normal, 60, &mut Pcg64::seed_from_u64(3)).is_empty());
    }

    #[test]
    fn pattern_cycles_are_capped() {
        let pattern = BreathingPattern {
            cycles: u32::MAX,
            ..BreathingPreset::Box.pattern()
        };
        let cues = build(&pattern, None, Pace::Normal, 5, &mut Pcg64::seed_from_u64(3));
        assert_eq!(cues.last().unwrap().timing_ms, estimated_total_ms(&pattern, Pace::Normal, 5));
    }
}
