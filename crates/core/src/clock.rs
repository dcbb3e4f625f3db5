//! Wall-clock source with server drift correction.
//!
//! Expiry decisions compare a drift-corrected "now" against epoch-millisecond
//! timestamps, so a skewed local clock cannot keep a reservation alive (or
//! expire it early).

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;

/// Clock abstraction used by every time-dependent decision in the engine.
pub trait Clock: Send + Sync {
    /// Local wall-clock time in epoch milliseconds.
    fn local_now_ms(&self) -> i64;

    /// Correction to apply to local time (server time minus local time).
    fn drift_ms(&self) -> i64;

    /// Drift-corrected time in epoch milliseconds.
    fn now_ms(&self) -> i64 {
        self.local_now_ms() + self.drift_ms()
    }
}

/// System clock with an externally supplied drift correction.
#[derive(Debug, Default)]
pub struct SystemClock {
    drift_ms: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_drift_ms(&self, drift_ms: i64) {
        self.drift_ms.store(drift_ms, Ordering::Relaxed);
    }

    /// Record a server-reported time and derive the drift from it.
    pub fn observe_server_time(&self, server_now_ms: i64) {
        self.set_drift_ms(server_now_ms - self.local_now_ms());
    }
}

impl Clock for SystemClock {
    fn local_now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn drift_ms(&self) -> i64 {
        self.drift_ms.load(Ordering::Relaxed)
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
    drift_ms: AtomicI64,
}

impl ManualClock {
    pub fn at(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
            drift_ms: AtomicI64::new(0),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn advance(&self, by: Duration) {
        let ms = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn set_drift_ms(&self, drift_ms: i64) {
        self.drift_ms.store(drift_ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn local_now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::Relaxed)
    }

    fn drift_ms(&self) -> i64 {
        self.drift_ms.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_is_applied_to_now() {
        let clock = ManualClock::at(1_000);
        clock.set_drift_ms(-250);
        assert_eq!(clock.now_ms(), 750);

        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now_ms(), 2_750);
    }

    #[test]
    fn system_clock_derives_drift_from_server_time() {
        let clock = SystemClock::new();
        let server = clock.local_now_ms() + 60_000;
        clock.observe_server_time(server);

        let drift = clock.drift_ms();
        assert!((59_000..=60_000).contains(&drift), "drift was {drift}");
    }
}
