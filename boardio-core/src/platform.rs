//! Platform utilities: sleeping, uptime, cycle counter and entropy

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use boardio_hal::Result;
use embedded_hal::delay::DelayNs;
use log::trace;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::clock::Clock;
use crate::timer::TimerService;

const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MILLI: u64 = 1_000_000;

/// Time and entropy services of one HAL
///
/// Clones share the clock and random source.
#[derive(Clone)]
pub struct Platform {
    clock: Arc<Clock>,
    timers: Arc<TimerService>,
    cycles_per_second: u32,
    rng: Arc<parking_lot::Mutex<StdRng>>,
}

impl Platform {
    pub(crate) fn new(
        clock: Arc<Clock>,
        timers: Arc<TimerService>,
        cycles_per_second: u32,
        rng_seed: Option<u64>,
    ) -> Self {
        let rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            clock,
            timers,
            cycles_per_second,
            rng: Arc::new(parking_lot::Mutex::new(rng)),
        }
    }

    /// Suspend the calling task for `ms` milliseconds
    ///
    /// On a manual clock this advances simulated time instead.
    pub fn sleep_ms(&self, ms: u32) {
        if self.clock.is_manual() {
            self.advance_ns(u64::from(ms) * NANOS_PER_MILLI);
        } else {
            thread::sleep(Duration::from_millis(u64::from(ms)));
        }
    }

    /// Busy-wait for `us` microseconds without yielding
    pub fn wait_us(&self, us: u32) {
        self.wait_ns(u64::from(us) * 1_000);
    }

    fn wait_ns(&self, ns: u64) {
        if self.clock.is_manual() {
            self.advance_ns(ns);
            return;
        }
        let until = Instant::now() + Duration::from_nanos(ns);
        while Instant::now() < until {
            core::hint::spin_loop();
        }
    }

    /// Milliseconds since start
    pub fn uptime_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Low 32 bits of [`Platform::uptime_ms`]
    pub fn uptime_ms_32(&self) -> u32 {
        self.clock.now_ms() as u32
    }

    /// Free-running hardware cycle counter; wraps
    pub fn hwcycle_get(&self) -> u32 {
        let cycles = u128::from(self.clock.now_ns()) * u128::from(self.cycles_per_second)
            / NANOS_PER_SECOND;
        cycles as u32
    }

    /// Convert a cycle count to nanoseconds
    pub fn hwcycle_to_ns(&self, cycles: u32) -> u64 {
        (u128::from(cycles) * NANOS_PER_SECOND / u128::from(self.cycles_per_second)) as u64
    }

    pub fn cycles_per_second(&self) -> u32 {
        self.cycles_per_second
    }

    /// Fill `buf` with random bytes
    pub fn random_fill(&self, buf: &mut [u8]) {
        self.rng.lock().fill_bytes(buf);
    }

    /// Advance a manual clock by `ms` and run every timer expiry now due
    ///
    /// `InvalidOperation` on a monotonic clock.
    pub fn advance_ms(&self, ms: u64) -> Result<()> {
        let now_ns = self
            .clock
            .advance_ns(ms.saturating_mul(NANOS_PER_MILLI))?;
        trace!("clock advanced to {} ms", now_ns / NANOS_PER_MILLI);
        self.timers.fire_due(now_ns / NANOS_PER_MILLI);
        Ok(())
    }

    fn advance_ns(&self, ns: u64) {
        if let Ok(now_ns) = self.clock.advance_ns(ns) {
            self.timers.fire_due(now_ns / NANOS_PER_MILLI);
        }
    }

    /// `embedded-hal` delay provider backed by this platform
    pub fn delay(&self) -> Delay {
        Delay {
            platform: self.clone(),
        }
    }
}

/// Blocking delay for drivers written against `embedded-hal`
///
/// Delays of a millisecond or more sleep; shorter ones spin.
#[derive(Clone)]
pub struct Delay {
    platform: Platform,
}

impl DelayNs for Delay {
    fn delay_ns(&mut self, ns: u32) {
        if u64::from(ns) >= NANOS_PER_MILLI && !self.platform.clock.is_manual() {
            thread::sleep(Duration::from_nanos(u64::from(ns)));
        } else {
            self.platform.wait_ns(u64::from(ns));
        }
    }
}
