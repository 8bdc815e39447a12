pub mod activity;
pub mod config;
pub mod guide;
pub mod plan;
pub mod presets;
pub mod simulate;

use tempocue_core::events::GuidanceEvent;
use tempocue_core::events::TimerControl;

/// `m:ss.s` for a millisecond offset.
pub fn format_clock(ms: u64) -> String {
    let tenths = ms / 100;
    format!("{}:{:02}.{}", tenths / 600, (tenths / 10) % 60, tenths % 10)
}

/// One human-readable line for an event, or `None` for events that are
/// only interesting as JSON (progress updates).
pub fn describe_event(event: &GuidanceEvent) -> Option<String> {
    match event {
        GuidanceEvent::CueFired { cue } => Some(format!("  {}", cue.text)),
        GuidanceEvent::StepStarted {
            step_index,
            step_name,
        } => Some(format!("[step {}] {step_name}", step_index + 1)),
        GuidanceEvent::StepCompleted { step_name, .. } => Some(format!("[done] {step_name}")),
        GuidanceEvent::ActivityCompleted { summary } => Some(format!(
            "[finished] {}: {}/{} steps in {}{}",
            summary.title,
            summary.completed_steps.len(),
            summary.total_steps,
            format_clock(summary.elapsed_ms),
            if summary.stopped_early { " (stopped)" } else { "" }
        )),
        GuidanceEvent::TimerControl { control } => Some(match control {
            TimerControl::Start { duration_ms } => {
                format!("[timer] start {}", format_clock(*duration_ms))
            }
            TimerControl::Stop => "[timer] stop".to_string(),
            TimerControl::Reset { remaining_ms } => {
                format!("[timer] {} left", format_clock(*remaining_ms))
            }
        }),
        GuidanceEvent::RestPeriod { rest } => Some(match rest {
            tempocue_core::RestPeriod::Start { duration_ms } => {
                format!("[rest] {}", format_clock(*duration_ms))
            }
            tempocue_core::RestPeriod::End => "[rest] over".to_string(),
        }),
        GuidanceEvent::Error { message } => Some(format!("[error] {message}")),
        GuidanceEvent::Progress { .. } => None,
    }
}
