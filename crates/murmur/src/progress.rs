//! Progress estimation for running jobs.
//!
//! The estimate is the fraction of media covered by the segments produced so
//! far. Duration metadata is often wrong (streamed or VBR sources), so while a
//! job is still processing the reported value is capped below 1.0; only a
//! successful completion sets exactly 1.0.

use std::time::Duration;

use crate::job::ProgressInfo;

/// Highest progress reported before a job completes.
pub const PROCESSING_CEILING: f64 = 0.99;

/// Returns `covered / total` clamped to `[0, 1]`, or 0 when the total
/// duration is unknown, zero or not a number.
pub fn estimate(total_duration: Option<f64>, covered_duration: f64) -> f64 {
    match total_duration {
        Some(total) if total.is_finite() && total > 0.0 && covered_duration.is_finite() => {
            (covered_duration / total).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

/// Folds segment ends into a monotonically non-decreasing progress value.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_duration: Option<f64>,
    covered: f64,
    segments: u64,
    last: f64,
}

impl ProgressTracker {
    pub fn new(total_duration: Option<f64>) -> Self {
        Self {
            total_duration,
            covered: 0.0,
            segments: 0,
            last: 0.0,
        }
    }

    /// Registers a segment ending at `segment_end` seconds and returns the
    /// updated progress.
    pub fn observe(&mut self, segment_end: f64) -> f64 {
        self.segments += 1;
        if segment_end.is_finite() && segment_end > self.covered {
            self.covered = segment_end;
        }
        let next = estimate(self.total_duration, self.covered).min(PROCESSING_CEILING);
        if next > self.last {
            self.last = next;
        }
        self.last
    }

    pub fn covered(&self) -> f64 {
        self.covered
    }

    /// Throughput snapshot after `elapsed` wall-clock time.
    pub fn info(&self, elapsed: Duration) -> ProgressInfo {
        let secs = elapsed.as_secs_f64();
        let speed = (secs > 0.0 && self.covered > 0.0).then(|| self.covered / secs);
        let remaining = match (self.total_duration, speed) {
            (Some(total), Some(speed)) if total.is_finite() && total > 0.0 => {
                Some((total - self.covered).max(0.0) / speed)
            }
            _ => None,
        };

        ProgressInfo {
            segments_processed: self.segments,
            covered_duration: self.covered,
            processing_speed: speed,
            estimated_time_remaining: remaining,
        }
    }
}
