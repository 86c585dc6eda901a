//! Progress reporting.
//!
//! `JobReporter` decouples the job operations from whoever is listening
//! (the notification bus, a terminal, a test). `ProgressThrottle` decides
//! which raw percentages are worth publishing.
//!
//! Both are driven synchronously from inside the running job.

use std::time::{Duration, Instant};

/// Receives progress and log output from a running job operation.
///
/// All methods are called synchronously on the job's own thread.
pub trait JobReporter: Send + Sync {
    /// Called with the overall percentage (0..=100).
    fn report(&self, percent: i32);

    /// Called with a human-readable line for the operator.
    fn log(&self, message: &str);
}

/// Rate limiter for percentage notifications.
///
/// A value is published when it differs from the last published one and is
/// either a boundary (0 or 100) or at least one percent ahead with more than
/// `interval` elapsed since the last publish. Anything else is dropped.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    last_percent: i32,
    last_emit: Option<Instant>,
    interval: Duration,
}

impl ProgressThrottle {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self::with_interval(Self::DEFAULT_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        ProgressThrottle {
            last_percent: -1,
            last_emit: None,
            interval,
        }
    }

    /// Last published percentage, -1 if nothing was published yet.
    pub fn last_percent(&self) -> i32 {
        self.last_percent
    }

    pub fn should_emit(&mut self, percent: i32) -> bool {
        self.should_emit_at(percent, Instant::now())
    }

    /// Same as `should_emit` with an explicit clock reading.
    pub fn should_emit_at(&mut self, percent: i32, now: Instant) -> bool {
        if percent == self.last_percent {
            return false;
        }

        // Never published counts as "long ago"
        let interval_passed = match self.last_emit {
            Some(at) => now.saturating_duration_since(at) > self.interval,
            None => true,
        };

        let emit = percent == 0
            || percent == 100
            || (percent > self.last_percent && interval_passed);

        if emit {
            self.last_percent = percent;
            self.last_emit = Some(now);
        } else {
            tracing::trace!(percent, last = self.last_percent, "progress update throttled");
        }
        emit
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new()
    }
}

/// `floor(100 * done / total)`, clamped to 100. A zero total counts as done.
pub fn percent_of(done: u64, total: u64) -> i32 {
    if total == 0 {
        return 100;
    }
    let percent = (done as u128 * 100) / total as u128;
    percent.min(100) as i32
}
