//! Trim window over the source video.

use serde::{Deserialize, Serialize};

/// Minimum length of a trim window in seconds.
pub const MIN_TRIM_SPAN: f64 = 0.1;

/// The `[start, end)` sub-range of the source selected for output.
///
/// Invariant: `0 <= start < end <= source_duration`, `end - start >= 0.1`
/// whenever the source is long enough to allow it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrimPoints {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TrimPoints {
    /// Build a trim window without clamping.
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    /// Build a trim window clamped into `[0, duration]` with the minimum
    /// span. Out-of-range input is corrected silently.
    pub fn clamped(start_secs: f64, end_secs: f64, duration_secs: f64) -> Self {
        let duration = sanitize(duration_secs).max(0.0);
        if duration <= MIN_TRIM_SPAN {
            return Self::new(0.0, duration.max(MIN_TRIM_SPAN));
        }

        let mut start = sanitize(start_secs).clamp(0.0, duration - MIN_TRIM_SPAN);
        let mut end = sanitize(end_secs).clamp(MIN_TRIM_SPAN, duration);
        if end - start < MIN_TRIM_SPAN {
            // Keep the start where the user put it when possible.
            end = (start + MIN_TRIM_SPAN).min(duration);
            start = end - MIN_TRIM_SPAN;
        }
        Self::new(start, end)
    }

    /// The whole source.
    pub fn full(duration_secs: f64) -> Self {
        Self::clamped(0.0, duration_secs, duration_secs)
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Whether `[start, end)` overlaps this window.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        crate::caption::overlaps(start, end, self.start_secs, self.end_secs)
    }

    /// Whether the window already satisfies its invariants for `duration`.
    pub fn is_within(&self, duration_secs: f64) -> bool {
        self.start_secs >= 0.0
            && self.end_secs <= duration_secs
            && self.end_secs - self.start_secs >= MIN_TRIM_SPAN - 1e-9
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else if value == f64::INFINITY {
        f64::MAX
    } else {
        0.0
    }
}
