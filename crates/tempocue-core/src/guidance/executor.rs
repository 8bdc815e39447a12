//! Guidance executor.
//!
//! Turns a cue plan into fired cues over time. No internal thread: in
//! self-scheduled mode every pending cue is an entry in a [`TimerSet`] and
//! the caller (or [`crate::runtime::GuidanceRuntime`]) calls `run_due()`
//! once `next_deadline_ms()` arrives. In tick-driven mode cues fire from
//! `update_progress_from_timer`, following an external clock.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Active <-> Paused -> Completed
//! (any) -> Idle            via reset()
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64;

use super::milestones::{self, Milestone, MilestoneKind, CUE_RANK};
use super::progress::{ExecutorStatus, Progress, TimingMode};
use super::reps::{RepTracker, DEFAULT_DEVIATION, DEFAULT_WINDOW};
use super::snapshot::{DetailedState, StepTimer, SNAPSHOT_VERSION};
use super::timers::{Deferred, TimerEntry, TimerSet};
use crate::clock::Clock;
use crate::error::GuidanceError;
use crate::events::{ActivitySummary, GuidanceCallbacks, NoopCallbacks, RestPeriod, TimerControl};
use crate::plan::{
    self, circuit, push_countdown, Activity, ActivityConfig, Cue, CueKind, CueMarker,
    GuidanceStyle, Pace, PlanOptions, StepMode,
};
use crate::storage::SnapshotStore;

/// Re-announcement before a re-entered step: lead line, then 3, 2, 1, Go!.
const ANNOUNCE_LEAD_MS: u64 = 4_000;
const RESUME_TEXT: &str = "Resuming. Let's keep going.";
const FIRST_STEP_NOTICE: &str = "You're already on the first exercise.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorSettings {
    /// Period of `on_progress` while active. Zero disables it.
    pub progress_interval_ms: u64,
    pub rep_window: usize,
    pub rep_deviation_threshold: f64,
    pub plan_options: PlanOptions,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            progress_interval_ms: 1_000,
            rep_window: DEFAULT_WINDOW,
            rep_deviation_threshold: DEFAULT_DEVIATION,
            plan_options: PlanOptions::default(),
        }
    }
}

/// Optional phase descriptor sent along with external ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseInfo {
    pub name: String,
    /// Deep phases (long holds, deep stillness) get fewer motivation cues
    /// under the light style.
    pub deep: bool,
}

impl PhaseInfo {
    pub fn new(name: impl Into<String>, deep: bool) -> Self {
        Self {
            name: name.into(),
            deep,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepEntry {
    Forward,
    Back,
}

#[derive(Debug, Clone)]
struct StepInfo {
    name: String,
    mode: StepMode,
}

#[derive(Debug, Clone, Copy)]
struct ExternalTick {
    elapsed_ms: u64,
    remaining_ms: u64,
}

struct Session {
    config: ActivityConfig,
    /// Styled plan: what is spoken.
    plan: Vec<Cue>,
    /// Derived from the unfiltered plan.
    milestones: Vec<Milestone>,
    steps: Vec<StepInfo>,
    mode: TimingMode,
    /// Pace multiplier the builder already applied to timings.
    baked_pace: f64,
}

#[derive(Debug, Clone)]
struct RunState {
    status: ExecutorStatus,
    next_cue: usize,
    next_milestone: usize,
    current_step: usize,
    epoch_ms: Option<u64>,
    paused_total_ms: u64,
    paused_at_ms: Option<u64>,
    completed_at_ms: Option<u64>,
    multiplier: f64,
    bound_source: Option<String>,
    completed_steps: Vec<usize>,
    resting: bool,
    step_timer: Option<StepTimer>,
    reps: RepTracker,
    external: Option<ExternalTick>,
}

impl RunState {
    fn new(settings: &ExecutorSettings, multiplier: f64) -> Self {
        Self {
            status: ExecutorStatus::Idle,
            next_cue: 0,
            next_milestone: 0,
            current_step: 0,
            epoch_ms: None,
            paused_total_ms: 0,
            paused_at_ms: None,
            completed_at_ms: None,
            multiplier,
            bound_source: None,
            completed_steps: Vec::new(),
            resting: false,
            step_timer: None,
            reps: RepTracker::new(settings.rep_window, settings.rep_deviation_threshold),
            external: None,
        }
    }
}

pub struct GuidanceExecutor {
    clock: Arc<dyn Clock>,
    settings: ExecutorSettings,
    rng: Box<dyn RngCore + Send>,
    callbacks: Box<dyn GuidanceCallbacks>,
    session: Option<Session>,
    state: RunState,
    timers: TimerSet,
    /// Entries parked while paused, on the paused timeline.
    suspended: Vec<TimerEntry>,
}

impl fmt::Debug for GuidanceExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuidanceExecutor")
            .field("status", &self.state.status)
            .field("mode", &self.timing_mode())
            .field("next_cue", &self.state.next_cue)
            .field("pending", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl GuidanceExecutor {
    pub fn new(clock: Arc<dyn Clock>, settings: ExecutorSettings) -> Self {
        Self {
            clock,
            state: RunState::new(&settings, 1.0),
            settings,
            rng: Box::new(Pcg64::from_entropy()),
            callbacks: Box::new(NoopCallbacks),
            session: None,
            timers: TimerSet::new(),
            suspended: Vec::new(),
        }
    }

    /// Replace the phrase-variant random source.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> ExecutorStatus {
        self.state.status
    }

    pub fn timing_mode(&self) -> Option<TimingMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    pub fn config(&self) -> Option<&ActivityConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    /// The styled plan being executed.
    pub fn plan(&self) -> &[Cue] {
        self.session.as_ref().map(|s| s.plan.as_slice()).unwrap_or(&[])
    }

    pub fn milestones(&self) -> &[Milestone] {
        self.session
            .as_ref()
            .map(|s| s.milestones.as_slice())
            .unwrap_or(&[])
    }

    pub fn pace_multiplier(&self) -> f64 {
        self.state.multiplier
    }

    /// Current reading of the executor's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Earliest pending fire time, if anything is scheduled.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn total_steps(&self) -> usize {
        self.session.as_ref().map(|s| s.steps.len()).unwrap_or(0)
    }

    /// Active time since `start`, pauses excluded.
    pub fn elapsed_ms(&self) -> u64 {
        let Some(epoch) = self.state.epoch_ms else {
            return 0;
        };
        let reference = self
            .state
            .completed_at_ms
            .or(self.state.paused_at_ms)
            .unwrap_or_else(|| self.clock.now_ms());
        reference
            .saturating_sub(epoch)
            .saturating_sub(self.state.paused_total_ms)
    }

    pub fn progress(&self) -> Progress {
        let Some(session) = &self.session else {
            return Progress::empty();
        };
        let s = &self.state;
        let now = self.clock.now_ms();
        let plan_end = session.plan.iter().map(|c| c.timing_ms).max().unwrap_or(0);

        let elapsed_ms = match (session.mode, s.external) {
            (TimingMode::TickDriven, Some(tick)) => tick.elapsed_ms,
            _ => self.elapsed_ms(),
        };
        let remaining_ms = match (s.status, session.mode) {
            (ExecutorStatus::Idle, _) => self.scaled(plan_end),
            (ExecutorStatus::Completed, _) => 0,
            (_, TimingMode::TickDriven) => s
                .external
                .map(|tick| tick.remaining_ms)
                .unwrap_or_else(|| self.scaled(plan_end).saturating_sub(elapsed_ms)),
            (ExecutorStatus::Paused, TimingMode::SelfScheduled) => {
                let reference = s.paused_at_ms.unwrap_or(now);
                latest_fire(self.suspended.iter()).saturating_sub(reference)
            }
            (ExecutorStatus::Active, TimingMode::SelfScheduled) => {
                latest_fire(self.timers.iter()).saturating_sub(now)
            }
        };

        Progress {
            status: s.status,
            current_step_index: s.current_step,
            total_steps: session.steps.len(),
            next_cue_index: s.next_cue,
            total_cues: session.plan.len(),
            elapsed_ms,
            remaining_ms,
            current_step_name: session.steps.get(s.current_step).map(|st| st.name.clone()),
            next_step_name: session
                .steps
                .get(s.current_step + 1)
                .map(|st| st.name.clone()),
            is_paused: s.status == ExecutorStatus::Paused,
            paused_at: s
                .paused_at_ms
                .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64)),
            completed_steps: s
                .completed_steps
                .iter()
                .filter_map(|&i| session.steps.get(i))
                .map(|st| st.name.clone())
                .collect(),
            pace_multiplier: s.multiplier,
        }
    }

    pub fn detailed_state(&self) -> DetailedState {
        let timers = if self.state.status == ExecutorStatus::Paused {
            self.suspended.clone()
        } else {
            self.timers.sorted()
        };
        DetailedState {
            version: SNAPSHOT_VERSION,
            status: self.state.status,
            plan_len: self.plan().len(),
            next_cue_index: self.state.next_cue,
            next_milestone_index: self.state.next_milestone,
            current_step_index: self.state.current_step,
            timers: timers
                .into_iter()
                .filter(|e| e.deferred != Deferred::Progress)
                .collect(),
            reps: self.state.reps.clone(),
            epoch_ms: self.state.epoch_ms,
            paused_total_ms: self.state.paused_total_ms,
            paused_at_ms: self.state.paused_at_ms,
            pace_multiplier: self.state.multiplier,
            completed_steps: self.state.completed_steps.clone(),
            resting: self.state.resting,
            step_timer: self.state.step_timer,
            saved_at_ms: self.clock.now_ms(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Load an activity. Any previous session is discarded.
    ///
    /// An empty plan is reported through `on_error` and leaves the
    /// executor idle with nothing loaded.
    pub fn initialize(
        &mut self,
        config: ActivityConfig,
        callbacks: Box<dyn GuidanceCallbacks>,
    ) -> Result<(), GuidanceError> {
        self.timers.cancel_all();
        self.suspended.clear();
        self.session = None;
        self.state = RunState::new(&self.settings, 1.0);
        self.callbacks = callbacks;

        let full = plan::build_plan_with(&config, self.settings.plan_options, &mut *self.rng);
        let styled = plan::apply_style(&full, config.style);
        if styled.is_empty() {
            let err = GuidanceError::PlanEmpty;
            tracing::warn!(kind = ?config.kind(), "activity produced no cues");
            self.notify("on_error", |cb| cb.on_error(&err));
            return Err(err);
        }

        let mode = if config.kind().is_tick_driven() {
            TimingMode::TickDriven
        } else {
            TimingMode::SelfScheduled
        };
        let baked_pace = match mode {
            TimingMode::TickDriven => config.pace.multiplier(),
            TimingMode::SelfScheduled => 1.0,
        };
        let plan_end_secs = (styled.iter().map(|c| c.timing_ms).max().unwrap_or(0) / 1_000) as u32;
        let steps = match &config.activity {
            Activity::Circuit { steps } | Activity::Stretching { steps } => steps
                .iter()
                .map(|s| StepInfo {
                    name: s.name.clone(),
                    mode: s.mode(),
                })
                .collect(),
            other => {
                let default_name = match other {
                    Activity::Breathing { pattern, .. } => pattern.resolve().name,
                    Activity::Meditation { .. } => "Meditation".to_string(),
                    _ => "Countdown".to_string(),
                };
                vec![StepInfo {
                    name: config.title.clone().unwrap_or(default_name),
                    mode: StepMode::Timed(plan_end_secs),
                }]
            }
        };

        self.state.multiplier = config.pace.multiplier() / baked_pace;
        tracing::info!(
            kind = ?config.kind(),
            ?mode,
            cues = styled.len(),
            steps = steps.len(),
            "guidance session initialized"
        );
        self.session = Some(Session {
            milestones: milestones::derive(&full),
            plan: styled,
            steps,
            mode,
            baked_pace,
            config,
        });
        Ok(())
    }

    pub fn start(&mut self) -> bool {
        let Some(mode) = self.timing_mode() else {
            return self.ignore("start");
        };
        match self.state.status {
            ExecutorStatus::Paused => return self.resume(),
            ExecutorStatus::Active | ExecutorStatus::Completed => return self.ignore("start"),
            ExecutorStatus::Idle => {}
        }

        let now = self.clock.now_ms();
        self.state.status = ExecutorStatus::Active;
        self.state.epoch_ms = Some(now);
        self.state.paused_total_ms = 0;
        self.state.paused_at_ms = None;
        self.state.completed_at_ms = None;
        tracing::info!(?mode, "guidance started");

        let first = self.state.current_step;
        let name = self.step_name(first);
        self.notify("on_step_start", |cb| cb.on_step_start(first, &name));

        match mode {
            TimingMode::SelfScheduled => {
                let pending = self.pending_from(self.state.next_cue, self.state.next_milestone);
                for (timing, deferred) in pending {
                    let at = now + self.scaled(timing);
                    self.timers.schedule(at, deferred);
                }
                self.arm_progress(now);
                self.run_due();
            }
            TimingMode::TickDriven => {
                self.fire_through(0, false);
                self.arm_progress(now);
            }
        }
        self.emit_progress();
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state.status != ExecutorStatus::Active {
            return self.ignore("pause");
        }
        let now = self.clock.now_ms();
        self.suspended = self
            .timers
            .cancel_all()
            .into_iter()
            .filter(|e| e.deferred != Deferred::Progress)
            .collect();
        self.state.paused_at_ms = Some(now);
        self.state.status = ExecutorStatus::Paused;
        tracing::info!(parked = self.suspended.len(), "guidance paused");
        self.emit_progress();
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state.status != ExecutorStatus::Paused {
            return self.ignore("resume");
        }
        let now = self.clock.now_ms();
        let delta = now.saturating_sub(self.state.paused_at_ms.unwrap_or(now));
        self.state.paused_total_ms += delta;
        self.state.paused_at_ms = None;
        self.state.status = ExecutorStatus::Active;

        if let Some(timer) = self.state.step_timer {
            let remaining = timer.remaining_at(self.elapsed_ms());
            if remaining <= 0 {
                self.state.step_timer = None;
                self.timer_control(TimerControl::Stop);
            } else {
                self.timer_control(TimerControl::Reset {
                    remaining_ms: remaining as u64,
                });
            }
        }

        let next_cue = self.state.next_cue;
        for mut entry in std::mem::take(&mut self.suspended) {
            if matches!(entry.deferred, Deferred::Cue { index } if index < next_cue) {
                continue;
            }
            entry.fire_at_ms += delta;
            self.timers.insert(entry);
        }

        let cue = Cue::new(self.elapsed_ms(), CueKind::Instruction, RESUME_TEXT).immediate();
        self.notify_cue(&cue);
        self.arm_progress(now);
        tracing::info!(paused_ms = delta, "guidance resumed");
        self.emit_progress();
        true
    }

    /// Complete the current step now and move to the next one.
    pub fn skip(&mut self) -> bool {
        if !matches!(
            self.state.status,
            ExecutorStatus::Active | ExecutorStatus::Paused
        ) || self.session.is_none()
        {
            return self.ignore("skip");
        }
        let step = self.state.current_step;
        self.stop_step_timer();
        self.end_rest();
        self.complete_step(step);
        if step + 1 >= self.total_steps() {
            tracing::info!(step, "skipped past the last step");
            self.finish(false);
            return true;
        }
        self.enter_step(step + 1, StepEntry::Forward);
        true
    }

    pub fn go_back(&mut self) -> bool {
        if !matches!(
            self.state.status,
            ExecutorStatus::Active | ExecutorStatus::Paused
        ) || self.session.is_none()
        {
            return self.ignore("go_back");
        }
        let step = self.state.current_step;
        if step == 0 {
            let cue = Cue::new(self.elapsed_ms(), CueKind::Instruction, FIRST_STEP_NOTICE)
                .immediate()
                .for_step(0);
            self.notify_cue(&cue);
            tracing::debug!("go_back refused on the first step");
            return false;
        }
        self.stop_step_timer();
        self.end_rest();
        self.state.completed_steps.retain(|&i| i < step - 1);
        self.enter_step(step - 1, StepEntry::Back);
        true
    }

    /// Change pace. Pending self-scheduled entries keep their order; only
    /// their remaining delays are stretched.
    pub fn adjust_pace(&mut self, pace: Pace) -> bool {
        if self.state.status == ExecutorStatus::Completed {
            return self.ignore("adjust_pace");
        }
        let Some(session) = self.session.as_mut() else {
            return self.ignore("adjust_pace");
        };
        session.config.pace = pace;
        let mode = session.mode;
        let new = pace.multiplier() / session.baked_pace;
        let old = self.state.multiplier;
        self.state.multiplier = new;
        tracing::info!(?pace, multiplier = new, "pace adjusted");

        if (new - old).abs() < f64::EPSILON
            || mode == TimingMode::TickDriven
            || self.state.status == ExecutorStatus::Idle
        {
            return true;
        }

        let ratio = new / old;
        let now = self.clock.now_ms();
        match self.state.status {
            ExecutorStatus::Active => {
                let origin = stretch_origin(self.timers.iter(), now);
                self.timers.retime(|e| {
                    stretchable(&e.deferred).then(|| stretch(e.fire_at_ms, origin, ratio))
                })
            }
            _ => {
                let origin =
                    stretch_origin(self.suspended.iter(), self.state.paused_at_ms.unwrap_or(now));
                for entry in self.suspended.iter_mut() {
                    if stretchable(&entry.deferred) {
                        entry.fire_at_ms = stretch(entry.fire_at_ms, origin, ratio);
                    }
                }
            }
        }
        self.state.reps.scale(ratio);

        let elapsed = self.elapsed_ms();
        let mut reset = None;
        if let Some(timer) = self.state.step_timer.as_mut() {
            let remaining = (timer.remaining_at(elapsed).max(0) as f64 * ratio).round() as u64;
            timer.duration_ms = elapsed.saturating_sub(timer.started_elapsed_ms) + remaining;
            reset = Some(remaining);
        }
        if let Some(remaining_ms) = reset {
            self.timer_control(TimerControl::Reset { remaining_ms });
        }
        true
    }

    /// End the session early. Fires the same completion side effects as
    /// running out of cues.
    pub fn stop(&mut self) -> bool {
        if self.session.is_none()
            || matches!(
                self.state.status,
                ExecutorStatus::Idle | ExecutorStatus::Completed
            )
        {
            return self.ignore("stop");
        }
        self.finish(true);
        true
    }

    /// Back to idle with the loaded plan, dropping all pending work.
    pub fn reset(&mut self) {
        self.timers.cancel_all();
        self.suspended.clear();
        let multiplier = self
            .session
            .as_ref()
            .map(|s| s.config.pace.multiplier() / s.baked_pace)
            .unwrap_or(1.0);
        self.state = RunState::new(&self.settings, multiplier);
        tracing::info!("guidance reset");
    }

    /// Acknowledge a repetition of the current rep-based step.
    ///
    /// `rep` defaults to the next one. Returns false when the step is not
    /// rep-based, not running, or already at its target.
    pub fn confirm_rep(&mut self, rep: Option<u32>) -> bool {
        if self.state.status != ExecutorStatus::Active {
            return self.ignore("confirm_rep");
        }
        let Some(session) = &self.session else {
            return self.ignore("confirm_rep");
        };
        if session.mode != TimingMode::SelfScheduled {
            tracing::debug!("confirm_rep ignored for a tick-driven session");
            return false;
        }
        let step = self.state.current_step;
        let Some(StepMode::Reps(target)) = session.steps.get(step).map(|s| s.mode) else {
            tracing::debug!(step, "confirm_rep ignored, step is not rep-based");
            return false;
        };
        if !self.state.step_timer.is_some_and(|t| t.step_index == step) {
            tracing::debug!(step, "confirm_rep ignored, step timer not running");
            return false;
        }
        let current = self.state.reps.current_rep();
        let rep = rep.unwrap_or(current + 1);
        if current >= target || rep <= current || rep > target {
            tracing::debug!(rep, current, target, "confirm_rep ignored");
            return false;
        }

        let now = self.clock.now_ms();
        let elapsed = self.elapsed_ms();
        let spoken: Vec<usize> = session
            .plan
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.step_index == Some(step) && matches!(c.marker, Some(CueMarker::Rep(j)) if j <= rep)
            })
            .map(|(i, _)| i)
            .collect();
        self.timers
            .cancel_where(|e| matches!(e.deferred, Deferred::Cue { index } if spoken.contains(&index)));

        let observation = self.state.reps.record(rep, elapsed);
        let cue = Cue::new(elapsed, CueKind::Count, rep.to_string())
            .for_step(step)
            .marked(CueMarker::Rep(rep));
        self.notify_cue(&cue);

        if let Some(ratio) = observation.rescale_ratio {
            tracing::debug!(
                ratio,
                average_ms = observation.average_ms,
                "rep pace drifted, rescaling step"
            );
            self.rescale_step(step, ratio, now);
        }
        let remaining_ms = self
            .state
            .step_timer
            .map(|t| t.remaining_at(elapsed).max(0) as u64)
            .unwrap_or(0);
        self.timer_control(TimerControl::Reset { remaining_ms });

        if rep == target {
            self.complete_reps_now(step, now);
        }
        self.run_due();
        true
    }

    /// Tick-driven entry point. Returns the number of cues fired.
    pub fn update_progress_from_timer(
        &mut self,
        source_id: &str,
        elapsed_secs: f64,
        remaining_secs: f64,
        phase: Option<&PhaseInfo>,
    ) -> usize {
        let Some(session) = &self.session else {
            self.ignore("update_progress_from_timer");
            return 0;
        };
        if session.mode != TimingMode::TickDriven {
            tracing::debug!("tick ignored for a self-scheduled session");
            return 0;
        }
        let style = session.config.style;

        let bound = self
            .state
            .bound_source
            .get_or_insert_with(|| source_id.to_string());
        if bound.as_str() != source_id {
            let err = GuidanceError::StaleTick {
                bound: bound.clone(),
                received: source_id.to_string(),
            };
            tracing::debug!(error = %err, "stale tick dropped");
            return 0;
        }
        if self.state.status != ExecutorStatus::Active {
            self.ignore("update_progress_from_timer");
            return 0;
        }

        let elapsed_ms = secs_to_ms(elapsed_secs);
        self.state.external = Some(ExternalTick {
            elapsed_ms,
            remaining_ms: secs_to_ms(remaining_secs),
        });
        let skip_motivation = style == GuidanceStyle::Light && phase.is_some_and(|p| p.deep);
        self.fire_through(elapsed_ms, skip_motivation)
    }

    /// Fire every self-scheduled entry that is due. Returns the number of
    /// cues spoken.
    pub fn run_due(&mut self) -> usize {
        let now = self.clock.now_ms();
        let mut fired = 0;
        while self.state.status == ExecutorStatus::Active {
            let Some(entry) = self.timers.pop_due(now) else {
                break;
            };
            fired += self.dispatch(entry, now);
        }
        fired
    }

    /// Restore a snapshot taken by [`detailed_state`](Self::detailed_state)
    /// on an executor initialized with the same activity.
    ///
    /// Entries whose fire time has passed are not replayed: their cues are
    /// skipped and their lifecycle effects applied silently.
    pub fn restore_detailed_state(&mut self, snapshot: DetailedState) -> Result<(), GuidanceError> {
        let Some(session) = &self.session else {
            return Err(GuidanceError::NotInitialized);
        };
        let mode = session.mode;
        let plan_len = session.plan.len();
        if !matches!(
            self.state.status,
            ExecutorStatus::Idle | ExecutorStatus::Paused
        ) {
            let err = GuidanceError::RestoreRejected {
                status: self.state.status,
            };
            tracing::warn!(error = %err, "restore rejected");
            return Err(err);
        }
        if snapshot.plan_len != plan_len {
            return Err(GuidanceError::PlanMismatch {
                expected: snapshot.plan_len,
                actual: plan_len,
            });
        }

        self.timers.cancel_all();
        self.suspended.clear();
        let now = self.clock.now_ms();
        let multiplier = if snapshot.pace_multiplier.is_finite() && snapshot.pace_multiplier > 0.0 {
            snapshot.pace_multiplier
        } else {
            self.state.multiplier
        };
        self.state = RunState {
            status: snapshot.status,
            next_cue: snapshot.next_cue_index,
            next_milestone: snapshot.next_milestone_index,
            current_step: snapshot.current_step_index,
            epoch_ms: snapshot.epoch_ms,
            paused_total_ms: snapshot.paused_total_ms,
            paused_at_ms: snapshot.paused_at_ms,
            completed_at_ms: (snapshot.status == ExecutorStatus::Completed)
                .then_some(snapshot.saved_at_ms),
            multiplier,
            bound_source: None,
            completed_steps: snapshot.completed_steps,
            resting: snapshot.resting,
            step_timer: snapshot.step_timer,
            reps: snapshot.reps,
            external: None,
        };

        let reference = match snapshot.status {
            ExecutorStatus::Paused => snapshot.paused_at_ms.unwrap_or(now),
            _ => now,
        };
        let mut entries = snapshot.timers;
        entries.sort_by_key(|e| (e.fire_at_ms, e.seq));
        let mut kept = Vec::new();
        let mut passed_milestones = Vec::new();
        for entry in entries {
            if entry.fire_at_ms > reference {
                if entry.deferred != Deferred::Progress {
                    kept.push(entry);
                }
                continue;
            }
            match entry.deferred {
                Deferred::Cue { index } => {
                    self.state.next_cue = self.state.next_cue.max(index + 1);
                }
                Deferred::Milestone { index } => {
                    self.state.next_milestone = self.state.next_milestone.max(index + 1);
                    passed_milestones.push((index, entry.fire_at_ms));
                }
                Deferred::Announce { .. } | Deferred::Progress => {}
            }
        }
        for (index, fire_at) in passed_milestones {
            let at_elapsed = self
                .state
                .epoch_ms
                .map(|epoch| {
                    fire_at
                        .saturating_sub(epoch)
                        .saturating_sub(self.state.paused_total_ms)
                })
                .unwrap_or(0);
            self.apply_milestone(index, at_elapsed, false);
        }

        tracing::info!(
            status = ?snapshot.status,
            pending = kept.len(),
            next_cue = self.state.next_cue,
            "guidance state restored"
        );
        match self.state.status {
            ExecutorStatus::Paused => self.suspended = kept,
            ExecutorStatus::Active => {
                for entry in kept {
                    self.timers.insert(entry);
                }
                let exhausted = !self
                    .timers
                    .iter()
                    .any(|e| matches!(e.deferred, Deferred::Cue { .. } | Deferred::Milestone { .. }));
                if mode == TimingMode::SelfScheduled && exhausted {
                    self.finish(false);
                    return Ok(());
                }
                self.arm_progress(now);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn save_snapshot(&self, store: &dyn SnapshotStore, session_id: &str) -> crate::Result<()> {
        store.save(session_id, &self.detailed_state())?;
        Ok(())
    }

    /// Load and restore `session_id`. Returns false when nothing is stored.
    pub fn restore_snapshot(
        &mut self,
        store: &dyn SnapshotStore,
        session_id: &str,
    ) -> crate::Result<bool> {
        let Some(snapshot) = store.load(session_id)? else {
            return Ok(false);
        };
        self.restore_detailed_state(snapshot)?;
        Ok(true)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn ignore(&self, operation: &'static str) -> bool {
        let err = if self.session.is_none() {
            GuidanceError::NotInitialized
        } else {
            GuidanceError::InvalidTransition {
                operation,
                status: self.state.status,
            }
        };
        tracing::debug!(operation, error = %err, "operation ignored");
        false
    }

    fn scaled(&self, ms: u64) -> u64 {
        scale(ms, self.state.multiplier)
    }

    fn step_name(&self, step: usize) -> String {
        self.session
            .as_ref()
            .and_then(|s| s.steps.get(step))
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    fn step_mode(&self, step: usize) -> Option<StepMode> {
        self.session
            .as_ref()
            .and_then(|s| s.steps.get(step))
            .map(|s| s.mode)
    }

    /// Cues from `cue_from` and milestones from `milestone_from`, merged
    /// into firing order with their plan timings.
    fn pending_from(&self, cue_from: usize, milestone_from: usize) -> Vec<(u64, Deferred)> {
        let mut merged: Vec<(u64, u8, usize, Deferred)> = self
            .plan()
            .iter()
            .enumerate()
            .skip(cue_from)
            .map(|(i, c)| (c.timing_ms, CUE_RANK, i, Deferred::Cue { index: i }))
            .chain(
                self.milestones()
                    .iter()
                    .enumerate()
                    .skip(milestone_from)
                    .map(|(i, m)| (m.timing_ms, m.rank(), i, Deferred::Milestone { index: i })),
            )
            .collect();
        merged.sort_by_key(|(timing, rank, i, _)| (*timing, *rank, *i));
        merged
            .into_iter()
            .map(|(timing, _, _, deferred)| (timing, deferred))
            .collect()
    }

    /// Plan timing of a cue or milestone entry.
    fn plan_timing(&self, deferred: &Deferred) -> Option<u64> {
        match deferred {
            Deferred::Cue { index } => self.plan().get(*index).map(|c| c.timing_ms),
            Deferred::Milestone { index } => self.milestones().get(*index).map(|m| m.timing_ms),
            Deferred::Announce { .. } | Deferred::Progress => None,
        }
    }

    fn dispatch(&mut self, entry: TimerEntry, now: u64) -> usize {
        match entry.deferred {
            Deferred::Cue { index } => {
                if index < self.state.next_cue {
                    tracing::trace!(index, "stale cue entry skipped");
                    return 0;
                }
                let mut fired = 0;
                if index > self.state.next_cue {
                    // Keep plan order if an earlier cue is still pending.
                    let from = self.state.next_cue;
                    let earlier = self.timers.cancel_where(
                        |e| matches!(e.deferred, Deferred::Cue { index: j } if j >= from && j < index),
                    );
                    for e in earlier {
                        if let Deferred::Cue { index: j } = e.deferred {
                            if self.state.status != ExecutorStatus::Active {
                                return fired;
                            }
                            self.fire_cue(j);
                            fired += 1;
                        }
                    }
                }
                if self.state.status == ExecutorStatus::Active {
                    self.fire_cue(index);
                    fired += 1;
                }
                fired
            }
            Deferred::Milestone { index } => {
                self.state.next_milestone = self.state.next_milestone.max(index + 1);
                let elapsed = self.elapsed_ms();
                self.apply_milestone(index, elapsed, true);
                0
            }
            Deferred::Announce { cue } => {
                self.notify_cue(&cue);
                1
            }
            Deferred::Progress => {
                self.emit_progress();
                self.arm_progress(now);
                0
            }
        }
    }

    /// Walk cues and milestones in merged order up to `limit_ms` of
    /// (scaled) plan time.
    fn fire_through(&mut self, limit_ms: u64, skip_motivation: bool) -> usize {
        let mut fired = 0;
        while self.state.status == ExecutorStatus::Active {
            let cue = self
                .plan()
                .get(self.state.next_cue)
                .map(|c| (c.timing_ms, CUE_RANK));
            let milestone = self
                .milestones()
                .get(self.state.next_milestone)
                .map(|m| (m.timing_ms, m.rank()));
            let (timing, is_cue) = match (cue, milestone) {
                (Some(c), Some(m)) if m < c => (m.0, false),
                (Some(c), _) => (c.0, true),
                (None, Some(m)) => (m.0, false),
                (None, None) => break,
            };
            if self.scaled(timing) > limit_ms {
                break;
            }

            if !is_cue {
                let index = self.state.next_milestone;
                self.state.next_milestone += 1;
                let elapsed = self.elapsed_ms();
                self.apply_milestone(index, elapsed, true);
                continue;
            }
            let index = self.state.next_cue;
            let is_motivation = self
                .plan()
                .get(index)
                .is_some_and(|c| c.kind == CueKind::Motivation);
            if skip_motivation && is_motivation {
                self.state.next_cue += 1;
                continue;
            }
            self.fire_cue(index);
            fired += 1;
        }
        fired
    }

    fn fire_cue(&mut self, index: usize) {
        let Some(cue) = self.plan().get(index).cloned() else {
            return;
        };
        self.state.next_cue = index + 1;
        self.notify_cue(&cue);
        if cue.kind == CueKind::Completion {
            self.finish(false);
        }
    }

    /// Apply a lifecycle milestone. With `emit` false only state changes,
    /// used for milestones that passed while a snapshot was stored.
    fn apply_milestone(&mut self, index: usize, at_elapsed: u64, emit: bool) {
        let Some(m) = self.milestones().get(index).copied() else {
            return;
        };
        match m.kind {
            MilestoneKind::StepEnter => {
                self.state.current_step = m.step_index;
                self.state.reps.clear();
                if emit {
                    let name = self.step_name(m.step_index);
                    self.notify("on_step_start", |cb| cb.on_step_start(m.step_index, &name));
                }
            }
            MilestoneKind::StepGo { duration_ms } => {
                let duration_ms = self.scaled(duration_ms);
                self.state.step_timer = Some(StepTimer {
                    step_index: m.step_index,
                    started_elapsed_ms: at_elapsed,
                    duration_ms,
                });
                if let Some(StepMode::Reps(target)) = self.step_mode(m.step_index) {
                    let assumed = circuit::REP_INTERVAL_MS as f64 * self.state.multiplier;
                    self.state.reps.begin_step(Some(target), assumed, at_elapsed);
                }
                if emit {
                    self.timer_control(TimerControl::Start { duration_ms });
                }
            }
            MilestoneKind::StepDone => {
                if self
                    .state
                    .step_timer
                    .is_some_and(|t| t.step_index == m.step_index)
                {
                    self.state.step_timer = None;
                    if emit {
                        self.timer_control(TimerControl::Stop);
                    }
                }
                if emit {
                    self.complete_step(m.step_index);
                } else if !self.state.completed_steps.contains(&m.step_index) {
                    self.state.completed_steps.push(m.step_index);
                }
            }
            MilestoneKind::RestStart { seconds } => {
                self.state.resting = true;
                if emit {
                    let duration_ms = self.scaled(u64::from(seconds) * 1_000);
                    self.rest_period(RestPeriod::Start { duration_ms });
                }
            }
            MilestoneKind::RestEnd => {
                if self.state.resting {
                    self.state.resting = false;
                    if emit {
                        self.rest_period(RestPeriod::End);
                    }
                }
            }
        }
    }

    /// Drop everything pending and lay the schedule out again from the
    /// start of `step`, behind a fresh spoken countdown.
    fn enter_step(&mut self, step: usize, entry: StepEntry) {
        self.timers.cancel_all();
        self.suspended.clear();
        self.state.step_timer = None;
        self.state.reps.clear();
        self.state.current_step = step;

        let name = self.step_name(step);
        self.notify("on_step_start", |cb| cb.on_step_start(step, &name));

        let (go_timing, cue_from, milestone_from) = {
            let plan = self.plan();
            let ms = self.milestones();
            let go = milestones::go_index(ms, step);
            let go_timing = go
                .map(|i| ms[i].timing_ms)
                .or_else(|| {
                    plan.iter()
                        .find(|c| c.step_index == Some(step))
                        .map(|c| c.timing_ms)
                })
                .unwrap_or(0);
            let milestone_from = go.unwrap_or_else(|| {
                ms.iter()
                    .position(|m| m.timing_ms >= go_timing)
                    .unwrap_or(ms.len())
            });
            let cue_from = plan
                .iter()
                .position(|c| {
                    c.step_index == Some(step) && c.timing_ms >= go_timing && !c.is_preamble()
                })
                .or_else(|| plan.iter().position(|c| c.timing_ms > go_timing))
                .unwrap_or(plan.len());
            (go_timing, cue_from, milestone_from)
        };

        let now = self.clock.now_ms();
        let paused = self.state.status == ExecutorStatus::Paused;
        let base = if paused {
            self.state.paused_at_ms.unwrap_or(now)
        } else {
            now
        };

        let lead = match entry {
            StepEntry::Forward => format!("Next up: {name}."),
            StepEntry::Back => format!("Going back to {name}."),
        };
        self.timers.schedule(
            base,
            Deferred::Announce {
                cue: Cue::new(go_timing, CueKind::Transition, lead).for_step(step),
            },
        );
        let mut countdown = Vec::new();
        push_countdown(&mut countdown, go_timing, &circuit::START_COUNTDOWN, Some(step));
        if let Some(last) = countdown.last_mut() {
            last.marker = Some(CueMarker::StepGo);
        }
        for cue in countdown {
            let at = base + 1_000 + (cue.timing_ms - go_timing);
            self.timers.schedule(at, Deferred::Announce { cue });
        }

        let start = base + ANNOUNCE_LEAD_MS;
        for (timing, deferred) in self.pending_from(cue_from, milestone_from) {
            let at = start + self.scaled(timing.saturating_sub(go_timing));
            self.timers.schedule(at, deferred);
        }
        self.state.next_cue = cue_from;
        self.state.next_milestone = milestone_from;

        tracing::info!(step, ?entry, next_cue = cue_from, "entered step");
        if paused {
            self.suspended = self.timers.cancel_all();
        } else {
            self.arm_progress(now);
        }
    }

    /// Stretch the current step's pending body by `ratio` around `now` and
    /// shift everything after it by the change in the step's end.
    fn rescale_step(&mut self, step: usize, ratio: f64, now: u64) {
        let Some(session) = &self.session else {
            return;
        };
        let Some(done) = milestones::done_index(&session.milestones, step) else {
            return;
        };
        let done_timing = session.milestones[done].timing_ms;
        let Some(old_end) = self.timers.fire_time_of(&Deferred::Milestone { index: done }) else {
            return;
        };
        let new_end = stretch(old_end, now, ratio);
        let shift = new_end as i64 - old_end as i64;

        let plan = &session.plan;
        let ms = &session.milestones;
        self.timers.retime(|e| {
            let in_body = match e.deferred {
                Deferred::Cue { index } => plan
                    .get(index)
                    .map(|c| c.step_index == Some(step) && c.timing_ms <= done_timing)?,
                Deferred::Milestone { index } => ms.get(index).map(|m| {
                    m.step_index == step
                        && matches!(m.kind, MilestoneKind::StepGo { .. } | MilestoneKind::StepDone)
                })?,
                Deferred::Announce { .. } | Deferred::Progress => return None,
            };
            Some(if in_body {
                stretch(e.fire_at_ms, now, ratio)
            } else {
                (e.fire_at_ms as i64 + shift).max(now as i64) as u64
            })
        });

        let elapsed = self.elapsed_ms();
        if let Some(timer) = self.state.step_timer.as_mut() {
            timer.duration_ms =
                elapsed.saturating_sub(timer.started_elapsed_ms) + new_end.saturating_sub(now);
        }
    }

    /// The last rep was confirmed: drop what is left of the step body and
    /// continue from the step's completion phrase right away.
    fn complete_reps_now(&mut self, step: usize, now: u64) {
        let Some(session) = &self.session else {
            return;
        };
        let Some(done) = milestones::done_index(&session.milestones, step) else {
            return;
        };
        let done_timing = session.milestones[done].timing_ms;
        let plan = &session.plan;
        let ms = &session.milestones;
        self.timers.cancel_where(|e| match e.deferred {
            Deferred::Cue { index } => plan
                .get(index)
                .is_some_and(|c| c.step_index == Some(step) && c.timing_ms < done_timing),
            Deferred::Milestone { index } => ms
                .get(index)
                .is_some_and(|m| m.step_index == step && matches!(m.kind, MilestoneKind::StepGo { .. })),
            Deferred::Announce { .. } | Deferred::Progress => false,
        });

        let multiplier = self.state.multiplier;
        let timings: Vec<(Deferred, u64)> = self
            .timers
            .iter()
            .filter_map(|e| self.plan_timing(&e.deferred).map(|t| (e.deferred.clone(), t)))
            .collect();
        self.timers.retime(|e| {
            let timing = timings
                .iter()
                .find(|(d, _)| d == &e.deferred)
                .map(|(_, t)| *t)?;
            (timing >= done_timing).then(|| now + scale(timing - done_timing, multiplier))
        });
        tracing::debug!(step, "all reps confirmed, completing step");
    }

    fn complete_step(&mut self, step: usize) {
        if step >= self.total_steps() || self.state.completed_steps.contains(&step) {
            return;
        }
        self.state.completed_steps.push(step);
        let name = self.step_name(step);
        self.notify("on_step_complete", |cb| cb.on_step_complete(step, &name));
    }

    fn stop_step_timer(&mut self) {
        if self.state.step_timer.take().is_some() {
            self.timer_control(TimerControl::Stop);
        }
    }

    fn end_rest(&mut self) {
        if self.state.resting {
            self.state.resting = false;
            self.rest_period(RestPeriod::End);
        }
    }

    fn finish(&mut self, stopped_early: bool) {
        self.timers.cancel_all();
        self.suspended.clear();
        self.stop_step_timer();
        self.end_rest();
        if !stopped_early {
            self.complete_step(self.state.current_step);
        }

        let now = self.clock.now_ms();
        if let Some(at) = self.state.paused_at_ms.take() {
            self.state.paused_total_ms += now.saturating_sub(at);
        }
        self.state.completed_at_ms = Some(now);
        self.state.status = ExecutorStatus::Completed;

        let summary = self.summary(stopped_early);
        tracing::info!(
            stopped_early,
            completed = summary.completed_steps.len(),
            elapsed_ms = summary.elapsed_ms,
            "guidance completed"
        );
        self.notify("on_activity_complete", |cb| cb.on_activity_complete(&summary));
        self.emit_progress();
    }

    fn summary(&self, stopped_early: bool) -> ActivitySummary {
        let progress = self.progress();
        let title = self
            .config()
            .and_then(|c| c.title.clone())
            .or_else(|| (self.total_steps() == 1).then(|| self.step_name(0)))
            .unwrap_or_else(|| "Workout".to_string());
        ActivitySummary {
            title,
            total_steps: progress.total_steps,
            completed_steps: progress.completed_steps,
            elapsed_ms: progress.elapsed_ms,
            stopped_early,
        }
    }

    fn arm_progress(&mut self, now: u64) {
        self.timers.cancel_where(|e| e.deferred == Deferred::Progress);
        let interval = self.settings.progress_interval_ms;
        if self.state.status == ExecutorStatus::Active && interval > 0 {
            self.timers.schedule(now + interval, Deferred::Progress);
        }
    }

    // ── Callbacks ────────────────────────────────────────────────────

    /// Invoke one callback. A panic inside it is logged and swallowed so
    /// the executor state stays consistent.
    fn notify(&mut self, callback: &'static str, f: impl FnOnce(&mut dyn GuidanceCallbacks)) {
        let callbacks = self.callbacks.as_mut();
        if panic::catch_unwind(AssertUnwindSafe(|| f(callbacks))).is_err() {
            tracing::warn!(callback, "guidance callback panicked");
        }
    }

    fn notify_cue(&mut self, cue: &Cue) {
        self.notify("on_cue", |cb| cb.on_cue(cue));
    }

    fn timer_control(&mut self, control: TimerControl) {
        self.notify("on_timer_control", |cb| cb.on_timer_control(control));
    }

    fn rest_period(&mut self, rest: RestPeriod) {
        self.notify("on_rest_period", |cb| cb.on_rest_period(rest));
    }

    fn emit_progress(&mut self) {
        let progress = self.progress();
        self.notify("on_progress", |cb| cb.on_progress(&progress));
    }
}

fn scale(ms: u64, multiplier: f64) -> u64 {
    (ms as f64 * multiplier).round() as u64
}

/// Move `at` so its distance from `origin` is multiplied by `ratio`.
fn stretch(at: u64, origin: u64, ratio: f64) -> u64 {
    origin + scale(at.saturating_sub(origin), ratio)
}

/// Plan entries follow pace; announcements and progress ticks do not.
fn stretchable(deferred: &Deferred) -> bool {
    matches!(deferred, Deferred::Cue { .. } | Deferred::Milestone { .. })
}

/// Plan entries stretch around `now`, or around the end of a pending
/// re-announcement so the step body never starts before its "Go!".
fn stretch_origin<'a>(entries: impl Iterator<Item = &'a TimerEntry>, now: u64) -> u64 {
    entries
        .filter(|e| matches!(e.deferred, Deferred::Announce { .. }))
        .map(|e| e.fire_at_ms)
        .fold(now, u64::max)
}

fn latest_fire<'a>(entries: impl Iterator<Item = &'a TimerEntry>) -> u64 {
    entries
        .filter(|e| e.deferred != Deferred::Progress)
        .map(|e| e.fire_at_ms)
        .max()
        .unwrap_or(0)
}

fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1_000.0).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::{EventLog, GuidanceEvent};
    use crate::plan::Step;

    fn executor(clock: &Arc<ManualClock>) -> GuidanceExecutor {
        GuidanceExecutor::new(clock.clone(), ExecutorSettings::default())
            .with_rng(Pcg64::seed_from_u64(7))
    }

    /// Opening 0, transition 5s, form 8s, get set 13s, countdown 15..18s,
    /// reps every 3s from 21s, step done at 51s, completion at 53s.
    fn one_rep_step() -> ActivityConfig {
        ActivityConfig::circuit(vec![Step::reps("Squats", 10)])
    }

    #[test]
    fn empty_plan_reports_error_and_stays_idle() {
        let clock = Arc::new(ManualClock::new(0));
        let mut ex = executor(&clock);
        let log = EventLog::new();
        let err = ex
            .initialize(ActivityConfig::circuit(vec![]), log.callbacks())
            .unwrap_err();
        assert_eq!(err, GuidanceError::PlanEmpty);
        assert_eq!(ex.status(), ExecutorStatus::Idle);
        assert_eq!(
            log.count(|e| matches!(e, GuidanceEvent::Error { .. })),
            1
        );
        assert!(!ex.start());
    }

    #[test]
    fn start_fires_opening_and_is_idempotent() {
        let clock = Arc::new(ManualClock::new(1_000));
        let mut ex = executor(&clock);
        let log = EventLog::new();
        ex.initialize(one_rep_step(), log.callbacks()).unwrap();
        assert!(ex.start());
        assert_eq!(ex.status(), ExecutorStatus::Active);
        assert_eq!(log.cues().len(), 1);
        assert!(!ex.start());
        assert_eq!(log.cues().len(), 1);
    }

    #[test]
    fn documented_no_ops_return_false() {
        let clock = Arc::new(ManualClock::new(0));
        let mut ex = executor(&clock);
        assert!(!ex.resume());
        assert!(!ex.pause());
        assert!(!ex.stop());
        ex.initialize(one_rep_step(), Box::new(NoopCallbacks)).unwrap();
        assert!(!ex.resume());
        assert!(!ex.confirm_rep(None));
        assert_eq!(ex.status(), ExecutorStatus::Idle);
    }

    #[test]
    fn paused_executor_fires_nothing() {
        let clock = Arc::new(ManualClock::new(0));
        let mut ex = executor(&clock);
        let log = EventLog::new();
        ex.initialize(one_rep_step(), log.callbacks()).unwrap();
        ex.start();
        assert!(ex.pause());
        let fired_before = log.cues().len();
        clock.advance(120_000);
        assert_eq!(ex.run_due(), 0);
        assert_eq!(log.cues().len(), fired_before);
        assert_eq!(ex.next_deadline_ms(), None);
    }

    #[test]
    fn step_timer_starts_at_go() {
        let clock = Arc::new(ManualClock::new(0));
        let mut ex = executor(&clock);
        let log = EventLog::new();
        ex.initialize(one_rep_step(), log.callbacks()).unwrap();
        ex.start();
        clock.set(18_000);
        ex.run_due();
        assert_eq!(
            log.timer_controls(),
            vec![TimerControl::Start { duration_ms: 33_000 }]
        );
    }

    #[test]
    fn slow_reps_stretch_the_rest_of_the_step() {
        let clock = Arc::new(ManualClock::new(0));
        let mut ex = executor(&clock);
        let log = EventLog::new();
        ex.initialize(one_rep_step(), log.callbacks()).unwrap();
        ex.start();
        clock.set(18_000);
        ex.run_due();

        clock.set(22_500);
        assert!(ex.confirm_rep(None));

        let state = ex.detailed_state();
        let done = milestones::done_index(ex.milestones(), 0).unwrap();
        let done_at = state
            .timers
            .iter()
            .find(|e| e.deferred == Deferred::Milestone { index: done })
            .map(|e| e.fire_at_ms);
        // 22.5s + (51s - 22.5s) * 1.5
        assert_eq!(done_at, Some(65_250));
        assert_eq!(
            log.timer_controls().last(),
            Some(&TimerControl::Reset { remaining_ms: 42_750 })
        );
        let counts: Vec<_> = log
            .cues()
            .into_iter()
            .filter(|c| c.kind == CueKind::Count)
            .map(|c| c.text)
            .collect();
        assert_eq!(counts, vec!["1"]);
    }

    #[test]
    fn last_rep_completes_step_immediately() {
        let clock = Arc::new(ManualClock::new(0));
        let mut ex = executor(&clock);
        let log = EventLog::new();
        ex.initialize(
            ActivityConfig::circuit(vec![Step::reps("Squats", 2), Step::timed("Plank", 20)]),
            log.callbacks(),
        )
        .unwrap();
        ex.start();
        clock.set(18_000);
        ex.run_due();
        clock.set(20_000);
        assert!(ex.confirm_rep(Some(2)));
        assert_eq!(ex.progress().completed_steps, vec!["Squats".to_string()]);
        assert!(!ex.confirm_rep(None));
        assert!(log.cues().iter().any(|c| c.marker == Some(CueMarker::StepDone)));
    }

    #[test]
    fn tick_driven_follows_external_elapsed() {
        let clock = Arc::new(ManualClock::new(0));
        let mut ex = executor(&clock);
        let log = EventLog::new();
        ex.initialize(ActivityConfig::countdown(60), log.callbacks()).unwrap();
        assert_eq!(ex.timing_mode(), Some(TimingMode::TickDriven));
        ex.start();
        assert_eq!(ex.update_progress_from_timer("ui", 49.0, 11.0, None), 0);
        // "Ten seconds." then 5, 4, 3
        let fired = ex.update_progress_from_timer("ui", 57.0, 3.0, None);
        assert_eq!(fired, 4);
        assert_eq!(ex.progress().remaining_ms, 3_000);
        assert_eq!(ex.update_progress_from_timer("other", 60.0, 0.0, None), 0);
        assert_eq!(ex.status(), ExecutorStatus::Active);
        ex.update_progress_from_timer("ui", 60.0, 0.0, None);
        assert_eq!(ex.status(), ExecutorStatus::Completed);
        assert_eq!(ex.progress().completed_steps, vec!["Countdown".to_string()]);
    }

    #[test]
    fn callback_panic_does_not_stop_later_cues() {
        struct Flaky(Arc<std::sync::Mutex<Vec<String>>>);
        impl GuidanceCallbacks for Flaky {
            fn on_cue(&mut self, cue: &Cue) {
                if cue.timing_ms == 0 {
                    panic!("speech engine exploded");
                }
                self.0.lock().unwrap().push(cue.text.clone());
            }
        }

        let spoken = Arc::new(std::sync::Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::new(0));
        let mut ex = executor(&clock);
        ex.initialize(one_rep_step(), Box::new(Flaky(spoken.clone())))
            .unwrap();
        ex.start();
        clock.set(8_000);
        ex.run_due();
        assert_eq!(spoken.lock().unwrap().len(), 2);
        assert_eq!(ex.status(), ExecutorStatus::Active);
    }

    #[test]
    fn reset_returns_to_idle_with_plan_loaded() {
        let clock = Arc::new(ManualClock::new(0));
        let mut ex = executor(&clock);
        ex.initialize(one_rep_step(), Box::new(NoopCallbacks)).unwrap();
        ex.start();
        clock.set(10_000);
        ex.run_due();
        ex.reset();
        assert_eq!(ex.status(), ExecutorStatus::Idle);
        assert_eq!(ex.next_deadline_ms(), None);
        assert_eq!(ex.progress().next_cue_index, 0);
        assert!(ex.start());
    }
}
