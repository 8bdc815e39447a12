use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::GuidanceError;
use crate::guidance::Progress;
use crate::plan::Cue;

/// Timer side effect requested from the caller's UI clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TimerControl {
    Start { duration_ms: u64 },
    Stop,
    Reset { remaining_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum RestPeriod {
    Start { duration_ms: u64 },
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub title: String,
    pub total_steps: usize,
    pub completed_steps: Vec<String>,
    pub elapsed_ms: u64,
    /// True when ended by `stop()` rather than by the plan running out.
    pub stopped_early: bool,
}

/// Everything the executor reports, as one serializable stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuidanceEvent {
    CueFired {
        cue: Cue,
    },
    StepStarted {
        step_index: usize,
        step_name: String,
    },
    StepCompleted {
        step_index: usize,
        step_name: String,
    },
    ActivityCompleted {
        summary: ActivitySummary,
    },
    Progress {
        progress: Progress,
    },
    TimerControl {
        control: TimerControl,
    },
    RestPeriod {
        rest: RestPeriod,
    },
    Error {
        message: String,
    },
}

/// Callback set the executor invokes. Every method defaults to a no-op.
///
/// A panic inside one callback is caught and logged; the executor keeps
/// running and later callbacks still fire. Callbacks must not call back
/// into the executor or a [`GuidanceRuntime`](crate::runtime::GuidanceRuntime)
/// driving it.
pub trait GuidanceCallbacks: Send {
    fn on_cue(&mut self, _cue: &Cue) {}
    fn on_step_start(&mut self, _step_index: usize, _step_name: &str) {}
    fn on_step_complete(&mut self, _step_index: usize, _step_name: &str) {}
    fn on_activity_complete(&mut self, _summary: &ActivitySummary) {}
    fn on_progress(&mut self, _progress: &Progress) {}
    fn on_timer_control(&mut self, _control: TimerControl) {}
    fn on_rest_period(&mut self, _rest: RestPeriod) {}
    fn on_error(&mut self, _error: &GuidanceError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl GuidanceCallbacks for NoopCallbacks {}

/// Adapts a closure over [`GuidanceEvent`] into a callback set.
pub struct EventHandler<F>(pub F);

impl<F> GuidanceCallbacks for EventHandler<F>
where
    F: FnMut(GuidanceEvent) + Send,
{
    fn on_cue(&mut self, cue: &Cue) {
        (self.0)(GuidanceEvent::CueFired { cue: cue.clone() });
    }

    fn on_step_start(&mut self, step_index: usize, step_name: &str) {
        (self.0)(GuidanceEvent::StepStarted {
            step_index,
            step_name: step_name.to_string(),
        });
    }

    fn on_step_complete(&mut self, step_index: usize, step_name: &str) {
        (self.0)(GuidanceEvent::StepCompleted {
            step_index,
            step_name: step_name.to_string(),
        });
    }

    fn on_activity_complete(&mut self, summary: &ActivitySummary) {
        (self.0)(GuidanceEvent::ActivityCompleted {
            summary: summary.clone(),
        });
    }

    fn on_progress(&mut self, progress: &Progress) {
        (self.0)(GuidanceEvent::Progress {
            progress: progress.clone(),
        });
    }

    fn on_timer_control(&mut self, control: TimerControl) {
        (self.0)(GuidanceEvent::TimerControl { control });
    }

    fn on_rest_period(&mut self, rest: RestPeriod) {
        (self.0)(GuidanceEvent::RestPeriod { rest });
    }

    fn on_error(&mut self, error: &GuidanceError) {
        (self.0)(GuidanceEvent::Error {
            message: error.to_string(),
        });
    }
}

/// Records every event into a shared list. Clones share the same list,
/// so one clone can be handed to the executor and another kept for
/// inspection.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<GuidanceEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callbacks(&self) -> Box<dyn GuidanceCallbacks> {
        let events = Arc::clone(&self.events);
        Box::new(EventHandler(move |event| {
            if let Ok(mut list) = events.lock() {
                list.push(event);
            }
        }))
    }

    pub fn events(&self) -> Vec<GuidanceEvent> {
        self.events.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<GuidanceEvent> {
        self.events
            .lock()
            .map(|mut l| std::mem::take(&mut *l))
            .unwrap_or_default()
    }

    /// Texts of fired cues, in firing order.
    pub fn cue_texts(&self) -> Vec<String> {
        self.cues().into_iter().map(|c| c.text).collect()
    }

    pub fn cues(&self) -> Vec<Cue> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GuidanceEvent::CueFired { cue } => Some(cue),
                _ => None,
            })
            .collect()
    }

    pub fn timer_controls(&self) -> Vec<TimerControl> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GuidanceEvent::TimerControl { control } => Some(control),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&GuidanceEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}
