//! Software timers
//!
//! Timers are driven by one shared service per HAL. On a monotonic clock
//! a background thread sleeps until the nearest deadline; on a manual
//! clock expiries are processed when the clock is advanced. Expiry
//! callbacks run in interrupt context.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Once, Weak};
use std::thread;
use std::time::Instant;

use boardio_hal::timer::{check_period, TimerMode};
use boardio_hal::{DeviceClass, DeviceId, Result};
use log::{debug, trace, warn};
use parking_lot::Condvar;

use crate::clock::Clock;
use crate::context::Hal;
use crate::irq::{self, Callback, CallbackSlot};
use crate::registry::{HandleId, Lease};

/// Most callback runs for one catch-up; further expiries are only counted
const CALLBACK_BURST: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Idle,
    Armed {
        mode: TimerMode,
        period_ms: u64,
        deadline_ms: u64,
    },
}

struct TimerShared {
    state: parking_lot::Mutex<TimerState>,
    expiries: AtomicU32,
    callback: CallbackSlot<Callback>,
}

impl TimerShared {
    fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new(TimerState::Idle),
            expiries: AtomicU32::new(0),
            callback: CallbackSlot::new(),
        }
    }

    fn deadline(&self) -> Option<u64> {
        match *self.state.lock() {
            TimerState::Armed { deadline_ms, .. } => Some(deadline_ms),
            TimerState::Idle => None,
        }
    }

    /// Account for every expiry up to `now_ms` and run the callback once
    /// per expiry, at most [`CALLBACK_BURST`] times
    fn expire(&self, now_ms: u64) {
        let fired = {
            let mut state = self.state.lock();
            match *state {
                TimerState::Armed {
                    mode,
                    period_ms,
                    deadline_ms,
                } if deadline_ms <= now_ms => match mode {
                    TimerMode::OneShot => {
                        *state = TimerState::Idle;
                        1
                    }
                    TimerMode::Periodic => {
                        let n = (now_ms - deadline_ms) / period_ms + 1;
                        *state = TimerState::Armed {
                            mode,
                            period_ms,
                            deadline_ms: deadline_ms + n * period_ms,
                        };
                        n
                    }
                },
                _ => 0,
            }
        };
        if fired == 0 {
            return;
        }
        let add = u32::try_from(fired).unwrap_or(u32::MAX);
        // Saturates instead of wrapping
        let _ = self
            .expiries
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(add))
            });
        if let Some(callback) = self.callback.get() {
            irq::isr(|| {
                for _ in 0..fired.min(CALLBACK_BURST) {
                    callback();
                }
            });
        }
    }
}

/// Expiry scheduler shared by all timers of one HAL
pub(crate) struct TimerService {
    clock: Arc<Clock>,
    timers: parking_lot::Mutex<Vec<Weak<TimerShared>>>,
    wake: Condvar,
    shutdown: AtomicBool,
    worker: Once,
}

impl TimerService {
    pub(crate) fn new(clock: Arc<Clock>) -> Self {
        Self {
            clock,
            timers: parking_lot::Mutex::new(Vec::new()),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
            worker: Once::new(),
        }
    }

    fn register(&self, timer: &Arc<TimerShared>) {
        let mut timers = self.timers.lock();
        timers.retain(|t| t.strong_count() > 0);
        timers.push(Arc::downgrade(timer));
    }

    /// A deadline changed
    fn kick(self: &Arc<Self>) {
        if self.clock.is_manual() {
            return;
        }
        self.worker.call_once(|| {
            let service = Arc::clone(self);
            let spawned = thread::Builder::new()
                .name("boardio-timers".into())
                .spawn(move || service.run());
            if let Err(e) = spawned {
                warn!("timer service failed to start: {}", e);
            }
        });
        let _timers = self.timers.lock();
        self.wake.notify_all();
    }

    /// Process every expiry due at `now_ms`
    pub(crate) fn fire_due(&self, now_ms: u64) {
        let due: Vec<Arc<TimerShared>> = self
            .timers
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|t| t.deadline().is_some_and(|d| d <= now_ms))
            .collect();
        for timer in due {
            timer.expire(now_ms);
        }
    }

    fn run(self: Arc<Self>) {
        debug!("timer service started");
        loop {
            {
                let mut timers = self.timers.lock();
                if self.shutdown.load(Ordering::Acquire) {
                    break;
                }
                let next = timers
                    .iter()
                    .filter_map(Weak::upgrade)
                    .filter_map(|t| t.deadline())
                    .min();
                match next {
                    None => self.wake.wait(&mut timers),
                    Some(ms) => {
                        let at = self.clock.instant_at_ms(ms);
                        if Instant::now() < at {
                            self.wake.wait_until(&mut timers, at);
                        }
                    }
                }
                if self.shutdown.load(Ordering::Acquire) {
                    break;
                }
            }
            self.fire_due(self.clock.now_ms());
        }
        debug!("timer service stopped");
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        let _timers = self.timers.lock();
        self.wake.notify_all();
    }
}

/// Handle to one software timer
pub struct Timer {
    lease: Lease,
    shared: Arc<TimerShared>,
    service: Arc<TimerService>,
    clock: Arc<Clock>,
}

impl Timer {
    /// Claim a free timer
    pub fn open(hal: &Hal) -> Result<Self> {
        let lease = hal.registry().open_any(DeviceClass::Timer)?;
        let shared = Arc::new(TimerShared::new());
        hal.timers().register(&shared);
        Ok(Self {
            lease,
            shared,
            service: Arc::clone(hal.timers()),
            clock: Arc::clone(hal.clock()),
        })
    }

    pub fn id(&self) -> DeviceId {
        self.lease.id()
    }

    /// Registry session backing this handle
    pub fn handle(&self) -> HandleId {
        self.lease.handle()
    }

    /// Arm the timer; restarting a running timer replaces its schedule
    pub fn start(&mut self, mode: TimerMode, period_ms: u32) -> Result<()> {
        self.lease.check()?;
        check_period(period_ms)?;
        let period_ms = u64::from(period_ms);
        *self.shared.state.lock() = TimerState::Armed {
            mode,
            period_ms,
            deadline_ms: self.clock.now_ms() + period_ms,
        };
        trace!("timer{} armed: {:?} {} ms", self.id(), mode, period_ms);
        self.service.kick();
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.lease.check()?;
        *self.shared.state.lock() = TimerState::Idle;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.deadline().is_some()
    }

    /// Expiries since the last call; saturates at `u32::MAX`
    pub fn status_get(&mut self) -> Result<u32> {
        self.lease.check()?;
        Ok(self.shared.expiries.swap(0, Ordering::AcqRel))
    }

    /// Milliseconds until the next expiry, 0 when idle
    pub fn remaining_get(&self) -> Result<u32> {
        self.lease.check()?;
        Ok(self.shared.deadline().map_or(0, |d| {
            let left = d.saturating_sub(self.clock.now_ms());
            u32::try_from(left).unwrap_or(u32::MAX)
        }))
    }

    /// Run `callback` on every expiry; `Busy` if one is installed
    pub fn add_callback(&mut self, callback: impl Fn() + Send + Sync + 'static) -> Result<()> {
        self.lease.check()?;
        self.shared.callback.install(Arc::new(callback))
    }

    pub fn remove_callback(&mut self) -> Result<()> {
        self.lease.check()?;
        self.shared.callback.uninstall();
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.teardown();
        self.lease.close()
    }

    fn teardown(&mut self) {
        *self.shared.state.lock() = TimerState::Idle;
        self.shared.callback.uninstall();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.teardown();
    }
}
