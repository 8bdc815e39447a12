use super::cue::{push_countdown, sort_plan, Cue, CueKind};
use super::phrases::spoken_duration;

pub(crate) fn build(duration_secs: u32) -> Vec<Cue> {
    if duration_secs == 0 {
        return Vec::new();
    }
    let secs = duration_secs;
    let end = u64::from(secs) * 1_000;
    let mut cues = Vec::new();

    if secs > 30 {
        cues.push(
            Cue::new(
                0,
                CueKind::Instruction,
                format!("Timer started for {}.", spoken_duration(secs)),
            )
            .immediate(),
        );
    }
    if secs >= 120 {
        cues.push(Cue::new(end / 2, CueKind::Motivation, "Halfway there."));
    }
    if secs > 120 {
        cues.push(Cue::new(end - 60_000, CueKind::Instruction, "One minute remaining.").immediate());
    }
    if secs > 60 {
        cues.push(Cue::new(end - 30_000, CueKind::Instruction, "Thirty seconds left.").immediate());
    }
    if secs > 15 {
        cues.push(Cue::new(end - 10_000, CueKind::Instruction, "Ten seconds.").immediate());
    }
    if secs > 5 {
        push_countdown(&mut cues, end - 5_000, &["5", "4", "3", "2", "1"], None);
    }
    cues.push(Cue::new(end, CueKind::Completion, "Time's up!"));

    sort_plan(&mut cues);
    cues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(cues: &[Cue]) -> Vec<&str> {
        cues.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn five_minute_timer_has_every_warning() {
        let cues = build(300);
        assert_eq!(
            texts(&cues),
            vec![
                "Timer started for 5 minutes.",
                "Halfway there.",
                "One minute remaining.",
                "Thirty seconds left.",
                "Ten seconds.",
                "5",
                "4",
                "3",
                "2",
                "1",
                "Time's up!",
            ]
        );
        assert_eq!(cues[1].timing_ms, 150_000);
    }

    #[test]
    fn two_minutes_has_halfway_but_no_minute_warning() {
        let cues = build(120);
        assert!(texts(&cues).contains(&"Halfway there."));
        assert!(!texts(&cues).contains(&"One minute remaining."));
        assert!(texts(&cues).contains(&"Thirty seconds left."));
    }

    #[test]
    fn short_timers_drop_opening_and_warnings() {
        assert_eq!(
            texts(&build(20)),
            vec!["Ten seconds.", "5", "4", "3", "2", "1", "Time's up!"]
        );
        assert_eq!(texts(&build(5)), vec!["Time's up!"]);
        assert_eq!(build(6).len(), 6);
    }

    #[test]
    fn final_countdown_is_five_separate_cues() {
        let cues = build(45);
        let tokens: Vec<_> = cues.iter().filter(|c| c.is_countdown()).collect();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0].timing_ms, 40_000);
        for pair in tokens.windows(2) {
            assert_eq!(pair[1].timing_ms - pair[0].timing_ms, 1_000);
        }
        assert_eq!(cues.last().unwrap().timing_ms, 45_000);
    }
}
