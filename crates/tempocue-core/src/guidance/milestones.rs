//! Step lifecycle points derived from cue markers.
//!
//! Milestones come from the unfiltered plan so that timer and rest side
//! effects still happen when the guidance style drops the cues that carry
//! the markers.

use serde::{Deserialize, Serialize};

use crate::plan::{Cue, CueKind, CueMarker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MilestoneKind {
    /// A step after the first one begins (its transition cue).
    StepEnter,
    /// Countdown reached "Go!": the step timer runs for `duration_ms`.
    StepGo { duration_ms: u64 },
    StepDone,
    RestStart { seconds: u32 },
    RestEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub timing_ms: u64,
    pub step_index: usize,
    pub kind: MilestoneKind,
}

impl Milestone {
    /// Ordering against a cue at the same timing: a step is entered before
    /// its transition is spoken, everything else happens after the cue.
    pub fn rank(&self) -> u8 {
        match self.kind {
            MilestoneKind::StepEnter => 0,
            _ => 2,
        }
    }
}

/// Rank of a plan cue relative to [`Milestone::rank`].
pub const CUE_RANK: u8 = 1;

pub fn derive(plan: &[Cue]) -> Vec<Milestone> {
    let mut out = Vec::new();
    for cue in plan {
        let Some(step) = cue.step_index else {
            continue;
        };
        if cue.kind == CueKind::Transition && step > 0 {
            out.push(Milestone {
                timing_ms: cue.timing_ms,
                step_index: step,
                kind: MilestoneKind::StepEnter,
            });
        }
        match cue.marker {
            Some(CueMarker::StepGo) => {
                let done = plan
                    .iter()
                    .find(|c| c.step_index == Some(step) && c.marker == Some(CueMarker::StepDone))
                    .map(|c| c.timing_ms)
                    .unwrap_or(cue.timing_ms);
                out.push(Milestone {
                    timing_ms: cue.timing_ms,
                    step_index: step,
                    kind: MilestoneKind::StepGo {
                        duration_ms: done.saturating_sub(cue.timing_ms),
                    },
                });
            }
            Some(CueMarker::StepDone) => out.push(Milestone {
                timing_ms: cue.timing_ms,
                step_index: step,
                kind: MilestoneKind::StepDone,
            }),
            Some(CueMarker::RestStart { seconds }) => {
                out.push(Milestone {
                    timing_ms: cue.timing_ms,
                    step_index: step,
                    kind: MilestoneKind::RestStart { seconds },
                });
                out.push(Milestone {
                    timing_ms: cue.timing_ms + u64::from(seconds) * 1_000,
                    step_index: step,
                    kind: MilestoneKind::RestEnd,
                });
            }
            _ => {}
        }
    }
    out.sort_by_key(|m| (m.timing_ms, m.rank()));
    out
}

/// Index of the `StepGo` milestone of `step`.
pub fn go_index(milestones: &[Milestone], step: usize) -> Option<usize> {
    milestones
        .iter()
        .position(|m| m.step_index == step && matches!(m.kind, MilestoneKind::StepGo { .. }))
}

/// Index of the `StepDone` milestone of `step`.
pub fn done_index(milestones: &[Milestone], step: usize) -> Option<usize> {
    milestones
        .iter()
        .position(|m| m.step_index == step && m.kind == MilestoneKind::StepDone)
}
