use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorStatus {
    #[default]
    Idle,
    Active,
    Paused,
    Completed,
}

/// Who decides when cues are due. Fixed at `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingMode {
    /// The executor keeps its own deferred timers (circuits, stretching).
    SelfScheduled,
    /// Cues follow elapsed time reported by an external shared clock
    /// (breathing, meditation, countdown).
    TickDriven,
}

/// Snapshot returned by `GuidanceExecutor::progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub status: ExecutorStatus,
    pub current_step_index: usize,
    pub total_steps: usize,
    pub next_cue_index: usize,
    pub total_cues: usize,
    /// Active time, pauses excluded.
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    pub current_step_name: Option<String>,
    pub next_step_name: Option<String>,
    pub is_paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_steps: Vec<String>,
    pub pace_multiplier: f64,
}

impl Progress {
    /// Progress of an executor with nothing loaded.
    pub fn empty() -> Self {
        Self {
            status: ExecutorStatus::Idle,
            current_step_index: 0,
            total_steps: 0,
            next_cue_index: 0,
            total_cues: 0,
            elapsed_ms: 0,
            remaining_ms: 0,
            current_step_name: None,
            next_step_name: None,
            is_paused: false,
            paused_at: None,
            completed_steps: Vec::new(),
            pace_multiplier: 1.0,
        }
    }

    /// 0.0 .. 100.0 through the cue plan.
    pub fn cue_progress_pct(&self) -> f64 {
        if self.total_cues == 0 {
            return 0.0;
        }
        (self.next_cue_index as f64 / self.total_cues as f64 * 100.0).min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ExecutorStatus::Paused).unwrap(),
            "\"paused\""
        );
        assert_eq!(
            serde_json::to_string(&TimingMode::TickDriven).unwrap(),
            "\"tick_driven\""
        );
    }

    #[test]
    fn cue_progress_handles_empty_plan() {
        let mut p = Progress::empty();
        assert_eq!(p.cue_progress_pct(), 0.0);
        p.total_cues = 4;
        p.next_cue_index = 1;
        assert_eq!(p.cue_progress_pct(), 25.0);
    }
}
