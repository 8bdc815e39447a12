//! Guidance execution.
//!
//! [`GuidanceExecutor`] runs one cue plan at a time and reports everything
//! through a [`GuidanceCallbacks`](crate::events::GuidanceCallbacks) set.

mod executor;
pub mod milestones;
mod progress;
pub mod reps;
mod snapshot;
pub mod timers;

pub use executor::{ExecutorSettings, GuidanceExecutor, PhaseInfo};
pub use milestones::{Milestone, MilestoneKind};
pub use progress::{ExecutorStatus, Progress, TimingMode};
pub use reps::{RepObservation, RepTracker};
pub use snapshot::{DetailedState, StepTimer, SNAPSHOT_VERSION};
pub use timers::{Deferred, TimerEntry, TimerSet};
