//! Phrase variants for cue text.
//!
//! Builders pick among equivalent phrasings with the caller's random
//! source, so a seeded generator reproduces a plan exactly.

use rand::seq::SliceRandom;
use rand::RngCore;

pub const FORM_CIRCUIT: &[&str] = &[
    "Keep your core tight and move with control.",
    "Focus on good form, quality over speed.",
    "Steady breathing, smooth movement.",
];

pub const FORM_STRETCHING: &[&str] = &[
    "Ease into the stretch, never force it.",
    "Breathe slowly and let the muscle relax.",
    "Find a gentle tension and stay there.",
];

pub const GET_SET: &[&str] = &["Get set.", "Get into position.", "Ready yourself."];

pub const STEP_DONE: &[&str] = &["Nice work!", "Great job!", "Well done!"];

pub const THIRD_REP: &[&str] = &["Good start, keep it up!", "Nice rhythm!"];
pub const MIDPOINT_REP: &[&str] = &["Halfway there!", "You're halfway, keep going!"];
pub const TWO_LEFT: &[&str] = &["Two more!", "Almost there, two to go!"];
pub const LAST_REP: &[&str] = &["Last one!", "Final rep, make it count!"];

pub const HOLD_QUARTER: &[&str] = &["Looking strong, keep holding.", "Stay steady."];
pub const HOLD_HALF: &[&str] = &["Halfway through the hold.", "Half done, breathe."];

pub const REST_MIDPOINT: &[&str] = &[
    "Shake it out and breathe.",
    "Take a sip of water if you need it.",
    "Recover, you're doing great.",
];

pub const INHALE: &[&str] = &["Breathe in.", "Inhale.", "And in."];
pub const HOLD: &[&str] = &["Hold.", "Hold gently."];
pub const EXHALE: &[&str] = &["Breathe out.", "Exhale.", "And out."];
pub const HOLD_EMPTY: &[&str] = &["Rest empty.", "Pause."];

pub const MINDFUL_INSTRUCTION: &[&str] = &[
    "Notice the breath moving in and out.",
    "If your mind has wandered, gently return to the breath.",
    "Feel the weight of your body, supported and still.",
    "Relax your jaw, your shoulders, your hands.",
];

pub const MINDFUL_MOTIVATION: &[&str] = &[
    "You're doing beautifully.",
    "There's nowhere else you need to be.",
    "Each breath is a fresh start.",
];

/// Choose one phrase from `variants` with the given random source.
pub fn pick<R: RngCore + ?Sized>(rng: &mut R, variants: &[&'static str]) -> &'static str {
    variants.choose(rng).copied().unwrap_or_default()
}

/// Spoken form of a duration such as "1 minute 30 seconds".
pub fn spoken_duration(secs: u32) -> String {
    let (m, s) = (secs / 60, secs % 60);
    let unit = |n: u32, word: &str| {
        if n == 1 {
            format!("1 {word}")
        } else {
            format!("{n} {word}s")
        }
    };
    match (m, s) {
        (0, s) => unit(s, "second"),
        (m, 0) => unit(m, "minute"),
        (m, s) => format!("{} {}", unit(m, "minute"), unit(s, "second")),
    }
}
