//! Body fetch outcome counters

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of body fetch outcomes for one recording session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Tracked fetches issued
    pub attempted: u64,
    /// Tracked fetches that captured a body
    pub succeeded: u64,
    /// Tracked fetches that ran out of attempts
    pub failed: u64,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted={} succeeded={} failed={}",
            self.attempted, self.succeeded, self.failed
        )
    }
}

/// Live counters owned by one session
#[derive(Debug, Default)]
pub struct StatsCounters {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl StatsCounters {
    /// Count a tracked fetch being issued
    pub fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a tracked fetch capturing its body
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a tracked fetch giving up
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values
    #[must_use]
    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
