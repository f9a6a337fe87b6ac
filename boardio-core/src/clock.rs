//! Time base
//!
//! The clock is either monotonic (wall time since the HAL was created) or
//! manual, where simulated time only moves when advanced explicitly.
//! Deadlines for blocking waits always use real time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use boardio_hal::{Error, Result, Timeout};
use serde::{Deserialize, Serialize};

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Clock source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockKind {
    /// Real time
    #[default]
    Monotonic,
    /// Simulated time, advanced by the caller
    Manual,
}

/// Uptime source shared by the platform utilities and the timer service
#[derive(Debug)]
pub struct Clock {
    epoch: Instant,
    manual_ns: Option<AtomicU64>,
}

impl Clock {
    pub fn new(kind: ClockKind) -> Self {
        Self {
            epoch: Instant::now(),
            manual_ns: match kind {
                ClockKind::Monotonic => None,
                ClockKind::Manual => Some(AtomicU64::new(0)),
            },
        }
    }

    pub fn kind(&self) -> ClockKind {
        if self.manual_ns.is_some() {
            ClockKind::Manual
        } else {
            ClockKind::Monotonic
        }
    }

    pub fn is_manual(&self) -> bool {
        self.manual_ns.is_some()
    }

    /// Nanoseconds since the epoch
    pub fn now_ns(&self) -> u64 {
        match &self.manual_ns {
            Some(ns) => ns.load(Ordering::Acquire),
            None => self.epoch.elapsed().as_nanos() as u64,
        }
    }

    /// Milliseconds since the epoch
    pub fn now_ms(&self) -> u64 {
        self.now_ns() / NANOS_PER_MILLI
    }

    /// Move a manual clock forward, returning the new time in nanoseconds
    pub fn advance_ns(&self, ns: u64) -> Result<u64> {
        match &self.manual_ns {
            Some(now) => {
                let prev = now
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                        Some(t.saturating_add(ns))
                    })
                    .unwrap_or_else(|t| t);
                Ok(prev.saturating_add(ns))
            }
            None => Err(Error::InvalidOperation),
        }
    }

    /// Wall-clock instant of a millisecond timestamp on a monotonic clock
    pub(crate) fn instant_at_ms(&self, ms: u64) -> Instant {
        self.epoch + Duration::from_millis(ms)
    }
}

/// Real-time deadline for a blocking wait; `None` waits forever
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    pub(crate) fn after(timeout: Timeout) -> Self {
        Deadline(timeout.duration().map(|d| Instant::now() + d))
    }

    pub(crate) fn instant(&self) -> Option<Instant> {
        self.0
    }

    /// Block on `cv` until notified or the deadline passes
    ///
    /// Returns true when the deadline has passed.
    pub(crate) fn wait<T>(
        &self,
        cv: &parking_lot::Condvar,
        guard: &mut parking_lot::MutexGuard<'_, T>,
    ) -> bool {
        match self.0 {
            None => {
                cv.wait(guard);
                false
            }
            Some(at) => cv.wait_until(guard, at).timed_out(),
        }
    }
}
