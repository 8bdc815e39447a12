use serde::{Deserialize, Serialize};

use super::progress::ExecutorStatus;
use super::reps::RepTracker;
use super::timers::TimerEntry;

pub const SNAPSHOT_VERSION: u32 = 1;

/// The running step's own countdown, in executor elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTimer {
    pub step_index: usize,
    pub started_elapsed_ms: u64,
    pub duration_ms: u64,
}

impl StepTimer {
    /// Milliseconds left at `elapsed_ms`; negative once overrun.
    pub fn remaining_at(&self, elapsed_ms: u64) -> i64 {
        let used = elapsed_ms.saturating_sub(self.started_elapsed_ms);
        self.duration_ms as i64 - used as i64
    }
}

/// Serializable executor state for continuing a session across restarts.
///
/// Fire times are absolute clock milliseconds. A paused snapshot keeps its
/// entries on the paused timeline and they are shifted on resume like any
/// other pause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedState {
    pub version: u32,
    pub status: ExecutorStatus,
    /// Length of the plan the snapshot was taken from.
    pub plan_len: usize,
    pub next_cue_index: usize,
    pub next_milestone_index: usize,
    pub current_step_index: usize,
    pub timers: Vec<TimerEntry>,
    pub reps: RepTracker,
    pub epoch_ms: Option<u64>,
    pub paused_total_ms: u64,
    pub paused_at_ms: Option<u64>,
    pub pace_multiplier: f64,
    #[serde(default)]
    pub completed_steps: Vec<usize>,
    #[serde(default)]
    pub resting: bool,
    #[serde(default)]
    pub step_timer: Option<StepTimer>,
    pub saved_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_timer_goes_negative_when_overrun() {
        let t = StepTimer {
            step_index: 0,
            started_elapsed_ms: 1_000,
            duration_ms: 5_000,
        };
        assert_eq!(t.remaining_at(2_000), 4_000);
        assert_eq!(t.remaining_at(9_000), -3_000);
        assert_eq!(t.remaining_at(0), 5_000);
    }
}
