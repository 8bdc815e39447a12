//! Guidance density filtering.
//!
//! Filtering only removes cues; the survivors keep their authored order
//! and timings.

use super::activity::GuidanceStyle;
use super::cue::{Cue, CueKind, CuePriority};

pub fn apply_style(cues: &[Cue], style: GuidanceStyle) -> Vec<Cue> {
    match style {
        GuidanceStyle::Full => cues.to_vec(),
        GuidanceStyle::Silent => silent(cues),
        GuidanceStyle::Light => light(cues),
    }
}

fn silent(cues: &[Cue]) -> Vec<Cue> {
    let has_completion = cues.iter().any(|c| c.kind == CueKind::Completion);
    // Latest-timed cue, last one wins on equal timings.
    let fallback = if has_completion {
        None
    } else {
        cues.iter()
            .enumerate()
            .max_by_key(|(_, c)| c.timing_ms)
            .map(|(i, _)| i)
    };
    cues.iter()
        .enumerate()
        .filter(|(i, c)| c.timing_ms == 0 || c.kind == CueKind::Completion || Some(*i) == fallback)
        .map(|(_, c)| c.clone())
        .collect()
}

fn light(cues: &[Cue]) -> Vec<Cue> {
    let total = cues.iter().map(|c| c.timing_ms).max().unwrap_or(0);
    cues.iter()
        .filter(|c| {
            if c.timing_ms == 0 || matches!(c.kind, CueKind::Completion | CueKind::Transition) {
                return true;
            }
            let sparse_kind = matches!(c.kind, CueKind::Motivation | CueKind::Instruction);
            let bucket = quarter_bucket(c.timing_ms, total);
            sparse_kind && c.priority == CuePriority::Queued && (1..=2).contains(&bucket)
        })
        .cloned()
        .collect()
}

/// Which quarter of the timeline `timing_ms` falls in (0..=3).
fn quarter_bucket(timing_ms: u64, total_ms: u64) -> u64 {
    if total_ms == 0 {
        return 0;
    }
    (timing_ms * 4 / total_ms).min(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Vec<Cue> {
        vec![
            Cue::new(0, CueKind::Instruction, "open").immediate(),
            Cue::new(10_000, CueKind::Motivation, "early"),
            Cue::new(30_000, CueKind::Motivation, "middle"),
            Cue::new(40_000, CueKind::Transition, "next"),
            Cue::new(50_000, CueKind::Count, "1"),
            Cue::new(60_000, CueKind::Instruction, "middle instruction"),
            Cue::new(61_000, CueKind::Instruction, "loud").immediate(),
            Cue::new(90_000, CueKind::Motivation, "late"),
            Cue::new(100_000, CueKind::Completion, "done"),
        ]
    }

    fn texts(cues: &[Cue]) -> Vec<&str> {
        cues.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn full_is_identity() {
        assert_eq!(apply_style(&plan(), GuidanceStyle::Full), plan());
    }

    #[test]
    fn light_keeps_mandatory_and_interior_queued_checkins() {
        let out = apply_style(&plan(), GuidanceStyle::Light);
        assert_eq!(
            texts(&out),
            vec!["open", "middle", "next", "middle instruction", "done"]
        );
    }

    #[test]
    fn silent_keeps_start_and_completion() {
        let out = apply_style(&plan(), GuidanceStyle::Silent);
        assert_eq!(texts(&out), vec!["open", "done"]);
    }

    #[test]
    fn silent_falls_back_to_latest_cue() {
        let cues = vec![
            Cue::new(5_000, CueKind::Instruction, "a"),
            Cue::new(9_000, CueKind::Motivation, "b"),
            Cue::new(9_000, CueKind::Count, "c"),
        ];
        let out = apply_style(&cues, GuidanceStyle::Silent);
        assert_eq!(texts(&out), vec!["c"]);
    }
}
