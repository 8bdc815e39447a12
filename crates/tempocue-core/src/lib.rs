//! # tempocue core library
//!
//! Timed spoken-guidance for workouts, stretching, breathing, meditation
//! and plain countdowns. The `tempocue` CLI is a thin layer over this
//! crate; anything it can do is available here.
//!
//! ## Architecture
//!
//! - **Plan builders**: turn an [`ActivityConfig`] into an ordered list of
//!   [`Cue`]s, then thin it out for the chosen [`GuidanceStyle`]
//! - **Guidance executor**: a state machine that fires cues on time, either
//!   from its own deadlines (circuit, stretching) or from an external
//!   shared clock (breathing, meditation, countdown)
//! - **Runtime**: tokio tasks that drive the executor in real time
//! - **Storage**: TOML configuration and executor snapshots in SQLite
//!
//! ## Key Components
//!
//! - [`GuidanceExecutor`]: Core guidance state machine
//! - [`GuidanceCallbacks`]: Event surface for the host application
//! - [`SnapshotStore`]: Session snapshot persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod guidance;
pub mod plan;
pub mod runtime;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use error::{ConfigError, CoreError, GuidanceError, Result, StoreError};
pub use events::{
    ActivitySummary, EventHandler, EventLog, GuidanceCallbacks, GuidanceEvent, NoopCallbacks,
    RestPeriod, TimerControl,
};
pub use guidance::{
    DetailedState, ExecutorSettings, ExecutorStatus, GuidanceExecutor, PhaseInfo, Progress,
    TimingMode,
};
pub use plan::{
    apply_style, build_plan, build_styled_plan, ActivityConfig, BreathingPreset, Cue, CueKind,
    CuePriority, GuidanceStyle, Pace, Step,
};
pub use runtime::{GuidanceRuntime, SharedClockTicker};
pub use storage::{Config, MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};
