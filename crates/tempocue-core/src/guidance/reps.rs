//! Repetition timing for adaptive pacing.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW: usize = 5;
pub const DEFAULT_DEVIATION: f64 = 0.2;

/// Result of recording one confirmed repetition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepObservation {
    pub interval_ms: Option<u64>,
    pub average_ms: f64,
    /// Set when the rolling average moved past the deviation threshold:
    /// pending cues of the step should be stretched by this factor.
    pub rescale_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepTracker {
    intervals: VecDeque<u64>,
    window: usize,
    deviation: f64,
    last_rep_elapsed_ms: Option<u64>,
    current_rep: u32,
    target_rep: Option<u32>,
    /// Weighted moving average of recent intervals.
    average_ms: f64,
}

impl RepTracker {
    pub fn new(window: usize, deviation: f64) -> Self {
        Self {
            intervals: VecDeque::with_capacity(window),
            window: window.max(1),
            deviation,
            last_rep_elapsed_ms: None,
            current_rep: 0,
            target_rep: None,
            average_ms: 0.0,
        }
    }

    /// Start tracking a step whose reps are scheduled `assumed_ms` apart,
    /// counting the first interval from `started_at_ms`.
    pub fn begin_step(&mut self, target: Option<u32>, assumed_ms: f64, started_at_ms: u64) {
        self.intervals.clear();
        self.last_rep_elapsed_ms = Some(started_at_ms);
        self.current_rep = 0;
        self.target_rep = target;
        self.average_ms = assumed_ms;
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
        self.last_rep_elapsed_ms = None;
        self.current_rep = 0;
        self.target_rep = None;
    }

    pub fn record(&mut self, rep: u32, at_elapsed_ms: u64) -> RepObservation {
        let interval = self
            .last_rep_elapsed_ms
            .map(|last| at_elapsed_ms.saturating_sub(last));
        if let Some(interval) = interval {
            if self.intervals.len() == self.window {
                self.intervals.pop_front();
            }
            self.intervals.push_back(interval);
        }
        self.last_rep_elapsed_ms = Some(at_elapsed_ms);
        self.current_rep = rep;

        let previous_ms = self.average_ms;
        if let Some(avg) = self.weighted_average() {
            self.average_ms = avg;
        }

        // Compared against the average before this rep, so a slow drift
        // never adds up to a rescale on its own.
        let mut rescale_ratio = None;
        if previous_ms > 0.0 && self.average_ms > 0.0 {
            let drift = (self.average_ms - previous_ms).abs() / previous_ms;
            if drift > self.deviation {
                rescale_ratio = Some(self.average_ms / previous_ms);
            }
        }

        RepObservation {
            interval_ms: interval,
            average_ms: self.average_ms,
            rescale_ratio,
        }
    }

    /// Linear weights, the most recent interval weighted highest.
    fn weighted_average(&self) -> Option<f64> {
        if self.intervals.is_empty() {
            return None;
        }
        let (sum, weights) = self
            .intervals
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(sum, weights), (i, &ms)| {
                let w = (i + 1) as f64;
                (sum + w * ms as f64, weights + w)
            });
        Some(sum / weights)
    }

    /// Scale the assumed interval, e.g. after a pace change.
    pub fn scale(&mut self, ratio: f64) {
        self.average_ms *= ratio;
    }

    pub fn current_rep(&self) -> u32 {
        self.current_rep
    }

    pub fn target_rep(&self) -> Option<u32> {
        self.target_rep
    }

    pub fn average_ms(&self) -> f64 {
        self.average_ms
    }

    pub fn intervals(&self) -> impl Iterator<Item = u64> + '_ {
        self.intervals.iter().copied()
    }
}

impl Default for RepTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_DEVIATION)
    }
}
