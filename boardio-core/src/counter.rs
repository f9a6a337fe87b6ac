//! Counter controller
//!
//! Counts input edges while started. The count wraps to zero past the
//! board's top value. An alarm fires the callback once after a number of
//! counted edges, with the count at that moment.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use boardio_hal::counter::{advance, CounterMode, Edge};
use boardio_hal::{DeviceClass, DeviceId, Error, Level, Result};
use log::debug;

use crate::context::Hal;
use crate::driver::{CounterDriver, EdgeSink};
use crate::irq::{CallbackSlot, CountCallback};
use crate::registry::{HandleId, Lease};

struct CounterShared {
    mode: spin::Mutex<Option<CounterMode>>,
    count: AtomicU32,
    top: u32,
    // Edges left until the alarm fires
    alarm: spin::Mutex<Option<u32>>,
    callback: CallbackSlot<CountCallback>,
}

impl EdgeSink for CounterShared {
    fn on_level(&self, from: Level, to: Level) {
        let edge = match (from, to) {
            (Level::Low, Level::High) => Edge::Rising,
            (Level::High, Level::Low) => Edge::Falling,
            _ => return,
        };
        let counts = matches!(*self.mode.lock(), Some(mode) if mode.counts(edge));
        if !counts {
            return;
        }
        let top = self.top;
        let prev = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(advance(c, top)))
            .unwrap_or_else(|c| c);
        let now = advance(prev, top);
        let fire = {
            let mut alarm = self.alarm.lock();
            match *alarm {
                Some(left) if left <= 1 => {
                    *alarm = None;
                    true
                }
                Some(left) => {
                    *alarm = Some(left - 1);
                    false
                }
                None => false,
            }
        };
        if fire {
            if let Some(callback) = self.callback.get() {
                callback(now);
            }
        }
    }
}

/// Handle to one edge counter
pub struct Counter {
    lease: Lease,
    driver: Arc<dyn CounterDriver>,
    shared: Arc<CounterShared>,
}

impl Counter {
    /// Open counter `id`, stopped at zero
    pub fn open(hal: &Hal, id: DeviceId) -> Result<Self> {
        let lease = hal.registry().open(DeviceClass::Counter, id)?;
        let driver = Arc::clone(&hal.board().counter);
        let shared = Arc::new(CounterShared {
            mode: spin::Mutex::new(None),
            count: AtomicU32::new(0),
            top: hal.config().counter.max_top_value,
            alarm: spin::Mutex::new(None),
            callback: CallbackSlot::new(),
        });
        driver.attach(id, shared.clone())?;
        Ok(Self {
            lease,
            driver,
            shared,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.lease.id()
    }

    /// Registry session backing this handle
    pub fn handle(&self) -> HandleId {
        self.lease.handle()
    }

    /// Begin counting; a running counter switches to `mode`
    pub fn start(&mut self, mode: CounterMode) -> Result<()> {
        self.lease.check()?;
        *self.shared.mode.lock() = Some(mode);
        debug!("counter{} started: {:?}", self.id(), mode);
        Ok(())
    }

    /// Stop counting; the count is kept
    pub fn stop(&mut self) -> Result<()> {
        self.lease.check()?;
        *self.shared.mode.lock() = None;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.mode.lock().is_some()
    }

    pub fn read(&self) -> Result<u32> {
        self.lease.check()?;
        Ok(self.shared.count.load(Ordering::Acquire))
    }

    /// Reset the count to zero without stopping
    pub fn clear(&mut self) -> Result<()> {
        self.lease.check()?;
        self.shared.count.store(0, Ordering::Release);
        Ok(())
    }

    /// Largest count before wrapping
    pub fn max_top_value(&self) -> u32 {
        self.shared.top
    }

    /// Install the alarm callback; `Busy` if one is installed
    pub fn add_callback(&mut self, callback: impl Fn(u32) + Send + Sync + 'static) -> Result<()> {
        self.lease.check()?;
        self.shared.callback.install(Arc::new(callback))
    }

    pub fn remove_callback(&mut self) -> Result<()> {
        self.lease.check()?;
        self.shared.callback.uninstall();
        Ok(())
    }

    /// Fire the callback once, `ticks` counted edges from now
    pub fn set_alarm(&mut self, ticks: u32) -> Result<()> {
        self.lease.check()?;
        if ticks == 0 || ticks > self.shared.top {
            return Err(Error::InvalidArgument);
        }
        *self.shared.alarm.lock() = Some(ticks);
        Ok(())
    }

    pub fn cancel_alarm(&mut self) -> Result<()> {
        self.lease.check()?;
        *self.shared.alarm.lock() = None;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.teardown();
        self.lease.close()
    }

    fn teardown(&mut self) {
        *self.shared.mode.lock() = None;
        *self.shared.alarm.lock() = None;
        self.shared.callback.uninstall();
        if self.lease.check().is_ok() {
            self.driver.detach(self.id());
        }
    }
}

impl Drop for Counter {
    fn drop(&mut self) {
        self.teardown();
    }
}
