//! Blocking waits and deadlines.

use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;

/// Source of blocking delays and monotonic time.
///
/// Every wait in this crate (retry backoff, mailbox polling, settling time) goes
/// through this trait. The waits are plain blocking sleeps: hardware state must
/// not change between a request and its response, so nothing else runs meanwhile.
pub trait Clock: DelayNs {
    /// Time elapsed since an arbitrary fixed point.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by the operating system.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Create a clock whose [`Clock::now`] counts from the moment of creation.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for SystemClock {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms.into()));
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}
