//! Rate limiting of recorded events.
//!
//! The filter is pure: it only answers whether an event at `now_ms` may be
//! recorded. Advancing the [`Clock`] on acceptance is the caller's job.

use serde::{Deserialize, Serialize};

/// How the configured sampling value maps to a minimum spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// The value is the minimum gap in milliseconds
    #[default]
    Milliseconds,
    /// The value is a rate; the gap is `1000 / value` milliseconds
    Hertz,
}

/// Decides whether an incoming event is recorded or dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingFilter {
    /// Minimum spacing between accepted events; `None` accepts everything
    min_gap_ms: Option<f64>,
}

impl SamplingFilter {
    /// Build a filter from the configured value and its interpretation.
    ///
    /// Zero (or any non-positive value) disables rate limiting.
    pub fn new(sampling_freq: f64, mode: SamplingMode) -> Self {
        let min_gap_ms = if sampling_freq > 0.0 {
            Some(match mode {
                SamplingMode::Milliseconds => sampling_freq,
                SamplingMode::Hertz => 1000.0 / sampling_freq,
            })
        } else {
            None
        };
        Self { min_gap_ms }
    }

    /// The effective gate in milliseconds, if any.
    pub fn min_gap_ms(&self) -> Option<f64> {
        self.min_gap_ms
    }

    /// Whether an event captured at `now_ms` should be recorded, given the
    /// time of the last accepted event.
    pub fn should_record(&self, now_ms: u64, last_accepted_ms: Option<u64>) -> bool {
        let (Some(gap), Some(last)) = (self.min_gap_ms, last_accepted_ms) else {
            return true;
        };
        // Timestamps running backwards count as "too soon".
        let elapsed = now_ms.saturating_sub(last);
        elapsed as f64 >= gap
    }
}

/// Timestamp of the last accepted event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    last_accepted_ms: Option<u64>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted_ms
    }

    /// Record an accepted event.
    pub fn accept(&mut self, now_ms: u64) {
        self.last_accepted_ms = Some(now_ms);
    }
}
