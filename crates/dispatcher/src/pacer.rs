//! Pacer - cadence controller for delivery starts
//!
//! Releases are spaced at least `spacing` apart. Unused slots are skipped,
//! never accumulated: after an idle period the next release happens at once,
//! and the following ones resume the regular spacing.

use tokio::time::{sleep_until, Duration, Instant};

/// Fixed-delay cadence
#[derive(Debug, Clone)]
pub struct Pacer {
    spacing: Duration,
    last_release: Option<Instant>,
}

impl Pacer {
    /// Create a pacer with the given minimum gap between releases
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_release: None,
        }
    }

    /// Minimum gap between releases
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Earliest instant of the next release (None before the first one)
    pub fn next_slot(&self) -> Option<Instant> {
        self.last_release.map(|last| last + self.spacing)
    }

    /// Wait until the next slot opens; returns immediately if it already has
    pub async fn ready(&self) {
        if let Some(slot) = self.next_slot() {
            sleep_until(slot).await;
        }
    }

    /// Record a release happening now
    ///
    /// Callers must have awaited `ready` first.
    pub fn mark_release(&mut self) -> Instant {
        let now = Instant::now();
        debug_assert!(self.next_slot().is_none_or(|slot| now >= slot));
        self.last_release = Some(now);
        now
    }
}
