use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueKind {
    Count,
    Instruction,
    Motivation,
    Transition,
    Completion,
    Rest,
}

/// Advisory hint for the speech layer. Not enforced by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CuePriority {
    Immediate,
    Queued,
}

/// Role a cue plays in the step lifecycle.
///
/// Markers are read by the executor to derive timer and rest side effects;
/// they never alter what is spoken or when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueMarker {
    /// One token of a spoken countdown.
    Countdown,
    /// The closing "Go!" of a step's countdown. The step timer starts here.
    StepGo,
    /// Spoken count for the given repetition (1-based).
    Rep(u32),
    /// The step's completion phrase.
    StepDone,
    RestStart { seconds: u32 },
}

/// A single timed unit of guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Milliseconds from activity start.
    pub timing_ms: u64,
    pub kind: CueKind,
    pub text: String,
    pub priority: CuePriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<CueMarker>,
}

impl Cue {
    pub fn new(timing_ms: u64, kind: CueKind, text: impl Into<String>) -> Self {
        let priority = match kind {
            CueKind::Motivation | CueKind::Instruction => CuePriority::Queued,
            _ => CuePriority::Immediate,
        };
        Self {
            timing_ms,
            kind,
            text: text.into(),
            priority,
            step_index: None,
            marker: None,
        }
    }

    pub fn immediate(mut self) -> Self {
        self.priority = CuePriority::Immediate;
        self
    }

    pub fn queued(mut self) -> Self {
        self.priority = CuePriority::Queued;
        self
    }

    pub fn for_step(mut self, step_index: usize) -> Self {
        self.step_index = Some(step_index);
        self
    }

    pub fn marked(mut self, marker: CueMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    /// True for countdown tokens, including a step's closing "Go!".
    pub fn is_countdown(&self) -> bool {
        matches!(
            self.marker,
            Some(CueMarker::Countdown) | Some(CueMarker::StepGo)
        )
    }

    /// Countdown tokens and transitions: the part of a step that is
    /// re-announced rather than replayed when the step is re-entered.
    pub fn is_preamble(&self) -> bool {
        self.is_countdown() || self.kind == CueKind::Transition
    }
}

/// Emit `tokens` as separate cues spaced exactly one second apart,
/// starting at `start_ms`. Returns the timing of the last token.
pub(crate) fn push_countdown(
    cues: &mut Vec<Cue>,
    start_ms: u64,
    tokens: &[&str],
    step_index: Option<usize>,
) -> u64 {
    let mut at = start_ms;
    for (i, token) in tokens.iter().enumerate() {
        at = start_ms + i as u64 * 1_000;
        let mut cue = Cue::new(at, CueKind::Instruction, *token)
            .immediate()
            .marked(CueMarker::Countdown);
        cue.step_index = step_index;
        cues.push(cue);
    }
    at
}

/// Stable sort by timing. Cues authored at the same instant keep their
/// authored order.
pub(crate) fn sort_plan(cues: &mut [Cue]) {
    cues.sort_by_key(|c| c.timing_ms);
}

/// Linearly rescale every timing so the last cue lands on `target_ms`.
pub(crate) fn rescale_to(cues: &mut [Cue], target_ms: u64) {
    let Some(last) = cues.last().map(|c| c.timing_ms) else {
        return;
    };
    if last == 0 || last == target_ms {
        return;
    }
    let factor = target_ms as f64 / last as f64;
    for cue in cues.iter_mut() {
        cue.timing_ms = (cue.timing_ms as f64 * factor).round() as u64;
    }
    if let Some(cue) = cues.last_mut() {
        cue.timing_ms = target_ms;
    }
}
