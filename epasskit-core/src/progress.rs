//! Chip read progress.

use std::sync::atomic::{AtomicU8, Ordering};

/// Number of steps the chip reader reports for a full DG1 + DG2 read.
pub const DEFAULT_TOTAL_STEPS: u32 = 7;

/// Converts a completed step index into a percentage of `total_steps`.
///
/// The result is rounded to the nearest integer and clamped to `0..=100`. A `total_steps` of
/// zero yields `0`.
#[uniffi::export]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn progress_percent(step: u32, total_steps: u32) -> u8 {
    if total_steps == 0 {
        return 0;
    }
    let percent = (f64::from(step) / f64::from(total_steps) * 100.0).round();
    // clamped, so the cast cannot truncate
    percent.clamp(0.0, 100.0) as u8
}

/// Latest progress of the running chip read.
///
/// Each update overwrites the stored value; signals may arrive repeatedly or out of order.
#[derive(Debug)]
pub struct ProgressTracker {
    total_steps: u32,
    percent: AtomicU8,
}

impl ProgressTracker {
    /// Creates a tracker at 0% for a read of `total_steps` steps.
    #[must_use]
    pub const fn new(total_steps: u32) -> Self {
        Self {
            total_steps,
            percent: AtomicU8::new(0),
        }
    }

    /// Resets progress to 0%.
    pub fn reset(&self) {
        self.percent.store(0, Ordering::SeqCst);
    }

    /// Records that `step` has completed and returns the new percentage.
    pub fn update(&self, step: u32) -> u8 {
        let percent = progress_percent(step, self.total_steps);
        self.percent.store(percent, Ordering::SeqCst);
        percent
    }

    /// The current percentage.
    #[must_use]
    pub fn get(&self) -> u8 {
        self.percent.load(Ordering::SeqCst)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_STEPS)
    }
}
