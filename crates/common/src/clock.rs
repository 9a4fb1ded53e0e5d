//! Frame timing utilities for export rendering.
//!
//! Export walks the trimmed range frame by frame. All frame times are
//! derived from the frame index (`i / fps`) rather than accumulated, so
//! floating point drift never shifts a frame onto the wrong source time.

/// Maps frame indices to timestamps for a fixed output frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: u32,
}

impl FrameClock {
    /// Create a clock for the given frame rate (clamped to at least 1).
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Duration of a single frame in seconds.
    pub fn frame_interval_secs(&self) -> f64 {
        1.0 / self.fps as f64
    }

    /// Number of frames needed to cover `duration_secs`: `ceil(D × F)`.
    pub fn total_frames(&self, duration_secs: f64) -> u64 {
        if duration_secs <= 0.0 {
            return 0;
        }
        // Guard against products like 2.9999999999 rounding up to an extra frame.
        let exact = duration_secs * self.fps as f64;
        let rounded = exact.round();
        if (exact - rounded).abs() < 1e-9 {
            rounded as u64
        } else {
            exact.ceil() as u64
        }
    }

    /// Timestamp of frame `index`, relative to the start of the range.
    pub fn frame_time(&self, index: u64) -> f64 {
        index as f64 / self.fps as f64
    }

    /// Duration covered by `frames` frames.
    pub fn duration_of(&self, frames: u64) -> f64 {
        frames as f64 / self.fps as f64
    }
}

/// Decides which frame indices should emit a progress report.
///
/// Reporting on every frame would dominate short renders, so reports are
/// sampled at roughly `target_reports` evenly spaced frames, plus the last.
#[derive(Debug)]
pub struct ProgressSampler {
    stride: u64,
    total: u64,
}

impl ProgressSampler {
    pub fn new(total: u64, target_reports: u64) -> Self {
        let stride = (total / target_reports.max(1)).max(1);
        Self { stride, total }
    }

    /// Whether progress should be reported after frame `index` completes.
    pub fn should_report(&self, index: u64) -> bool {
        index + 1 == self.total || (index + 1) % self.stride == 0
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }
}
