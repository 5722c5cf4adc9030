//! Clock abstraction.
//!
//! `occurred_at` is stamped from a `Clock` when an event is created and is
//! never recomputed, so replay sees the original timestamp.

use chrono::{DateTime, Utc};

/// Source of wall-clock time for the write path.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
