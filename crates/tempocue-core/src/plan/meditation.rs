use rand::RngCore;

use super::cue::{rescale_to, Cue, CueKind};
use super::phrases::{self, pick};

pub const OPENING_MS: u64 = 14_000;
pub const CLOSING_LEAD_MS: u64 = 45_000;
/// Shortest layout that fits the opening ritual and the closing sequence.
const MIN_LAYOUT_MS: u64 = 60_000;

/// Gap between mindfulness reminders; shorter sessions get denser guidance.
pub fn reminder_interval_ms(duration_secs: u32) -> u64 {
    let secs = match duration_secs {
        0..=120 => 30,
        121..=300 => 45,
        301..=600 => 60,
        _ => 90,
    };
    secs * 1_000
}

pub(crate) fn build<R: RngCore + ?Sized>(duration_secs: u32, rng: &mut R) -> Vec<Cue> {
    if duration_secs == 0 {
        return Vec::new();
    }
    let target = u64::from(duration_secs) * 1_000;
    let end = target.max(MIN_LAYOUT_MS);
    let closing = end - CLOSING_LEAD_MS;

    let mut cues = vec![
        Cue::new(
            0,
            CueKind::Instruction,
            "Welcome. Find a comfortable seat and close your eyes.",
        )
        .immediate(),
        Cue::new(6_000, CueKind::Instruction, "Take a deep breath in, and let it go."),
        Cue::new(
            OPENING_MS,
            CueKind::Instruction,
            "Bring your attention to the natural rhythm of your breath.",
        ),
    ];

    let interval = reminder_interval_ms(duration_secs);
    let mut t = OPENING_MS + interval;
    let mut instruction = true;
    while t < closing {
        let cue = if instruction {
            Cue::new(t, CueKind::Instruction, pick(rng, phrases::MINDFUL_INSTRUCTION))
        } else {
            Cue::new(t, CueKind::Motivation, pick(rng, phrases::MINDFUL_MOTIVATION))
        };
        cues.push(cue);
        instruction = !instruction;
        t += interval;
    }

    cues.push(Cue::new(
        closing,
        CueKind::Instruction,
        "Begin to bring your awareness back to the room.",
    ));
    cues.push(Cue::new(
        end - 30_000,
        CueKind::Instruction,
        "Wiggle your fingers and toes, and take a deeper breath.",
    ));
    cues.push(Cue::new(
        end - 15_000,
        CueKind::Instruction,
        "When you're ready, gently open your eyes.",
    ));
    cues.push(Cue::new(
        end,
        CueKind::Completion,
        "Meditation complete. Carry this calm with you.",
    ));

    rescale_to(&mut cues, target);
    cues
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn reminders(cues: &[Cue]) -> Vec<&Cue> {
        cues.iter()
            .filter(|c| c.timing_ms > OPENING_MS && c.kind != CueKind::Completion)
            .filter(|c| {
                phrases::MINDFUL_INSTRUCTION.contains(&c.text.as_str())
                    || phrases::MINDFUL_MOTIVATION.contains(&c.text.as_str())
            })
            .collect()
    }

    #[test]
    fn interval_shrinks_with_session_length() {
        assert_eq!(reminder_interval_ms(90), 30_000);
        assert_eq!(reminder_interval_ms(120), 30_000);
        assert_eq!(reminder_interval_ms(300), 45_000);
        assert_eq!(reminder_interval_ms(600), 60_000);
        assert_eq!(reminder_interval_ms(1_200), 90_000);
    }

    #[test]
    fn ten_minutes_has_alternating_reminders_and_ends_on_target() {
        let cues = build(600, &mut Pcg64::seed_from_u64(5));
        let found = reminders(&cues);
        assert_eq!(found.len(), 9);
        for (i, cue) in found.iter().enumerate() {
            let expected = if i % 2 == 0 {
                CueKind::Instruction
            } else {
                CueKind::Motivation
            };
            assert_eq!(cue.kind, expected);
            assert!(cue.timing_ms < 600_000 - CLOSING_LEAD_MS);
        }
        let last = cues.last().unwrap();
        assert_eq!(last.kind, CueKind::Completion);
        assert_eq!(last.timing_ms, 600_000);
        assert_eq!(
            cues.iter().filter(|c| c.kind == CueKind::Completion).count(),
            1
        );
    }

    #[test]
    fn short_session_is_rescaled_onto_target() {
        let cues = build(40, &mut Pcg64::seed_from_u64(5));
        assert_eq!(cues.last().unwrap().timing_ms, 40_000);
        assert!(cues.windows(2).all(|w| w[0].timing_ms <= w[1].timing_ms));
    }
}
