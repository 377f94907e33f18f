//! Time source used when stamping and checking tokens.

use chrono::{DateTime, Duration, Utc};

/// Supplies "now" to token issuance and validation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Returns a new clock moved forward (or back, for negative values) by `by`.
    #[must_use]
    pub fn advanced(&self, by: Duration) -> Self {
        Self(self.0 + by)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
