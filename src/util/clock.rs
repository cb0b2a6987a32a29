//! Clock capability.
//!
//! Time-dependent components take an `Arc<dyn Clock>` instead of reading
//! ambient time, so cache expiry and rate-limit windows are deterministic
//! under test.

use std::sync::{Mutex, MutexGuard};

use time::OffsetDateTime;

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> OffsetDateTime;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to. Test double.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        *self.guard() += by;
    }

    pub fn set(&self, to: OffsetDateTime) {
        *self.guard() = to;
    }

    fn guard(&self) -> MutexGuard<'_, OffsetDateTime> {
        match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> OffsetDateTime {
        *self.guard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(OffsetDateTime::UNIX_EPOCH);
        let before = clock.now_utc();
        clock.advance(std::time::Duration::from_secs(60));
        assert_eq!(clock.now_utc() - before, time::Duration::seconds(60));
    }
}
