//! Sync progress reporting.
//!
//! One pass moves through three weighted phases: the paged read owns the
//! first 60% of the bar, classification the next 30%, publication the final
//! 10%. The gauge enforces monotonicity within a pass; only `reset` at pass
//! start may move the value backwards.

use tokio::sync::watch;

const FETCH_WEIGHT: f64 = 0.6;
const CLASSIFY_WEIGHT: f64 = 0.3;

/// Fraction for `done` of `total` fetch pages. A zero-page library jumps
/// straight to the end of the fetch phase.
pub fn fetch_fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        return FETCH_WEIGHT;
    }
    FETCH_WEIGHT * (done as f64 / total as f64).min(1.0)
}

/// Fraction for `done` of `total` classified assets.
pub fn classify_fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        return FETCH_WEIGHT + CLASSIFY_WEIGHT;
    }
    FETCH_WEIGHT + CLASSIFY_WEIGHT * (done as f64 / total as f64).min(1.0)
}

/// Start of the publication phase.
pub const PUBLISH_FRACTION: f64 = 0.9;

/// Monotonic progress gauge published through a watch channel.
pub struct ProgressGauge {
    tx: watch::Sender<f64>,
}

impl ProgressGauge {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0.0);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.tx.subscribe()
    }

    /// Back to zero at the start of a fresh pass. The only permitted
    /// decrease.
    pub fn reset(&self) {
        self.tx.send_replace(0.0);
    }

    /// Advance to `fraction`, clamped so the published value never
    /// decreases within a pass and never exceeds 1.0.
    pub fn advance_to(&self, fraction: f64) {
        let clamped = fraction.clamp(0.0, 1.0);
        self.tx.send_if_modified(|current| {
            if clamped > *current {
                *current = clamped;
                true
            } else {
                false
            }
        });
    }

    /// Mark the pass complete. Published exactly once per pass because the
    /// gauge refuses repeats of the same value.
    pub fn complete(&self) {
        self.advance_to(1.0);
    }

    pub fn current(&self) -> f64 {
        *self.tx.borrow()
    }
}

impl Default for ProgressGauge {
    fn default() -> Self {
        Self::new()
    }
}
