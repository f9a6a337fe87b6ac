//! Interrupt execution context
//!
//! Driver events (pin edges, counter edges, received bytes, timer expiry,
//! async transfer completion) run inside [`isr`], which marks the current
//! thread as interrupt context until the closure returns. Code in that
//! context must not block: blocking waits and mutex operations refuse to
//! run there, callback slots use spin locks, and hand-off to threads goes
//! through [`IsrChannel`].

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::Instant;

use boardio_hal::{Error, Result, Timeout};
use crossbeam_queue::ArrayQueue;

use crate::clock::Deadline;

thread_local! {
    static IN_ISR: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is running interrupt-context code
pub fn in_isr() -> bool {
    IN_ISR.with(Cell::get)
}

/// Run `f` in interrupt context
pub fn isr<R>(f: impl FnOnce() -> R) -> R {
    struct Restore(bool);

    impl Drop for Restore {
        fn drop(&mut self) {
            IN_ISR.with(|flag| flag.set(self.0));
        }
    }

    let _restore = Restore(IN_ISR.with(|flag| flag.replace(true)));
    f()
}

/// Refuse waits that could block in interrupt context
pub(crate) fn check_blocking(timeout: Timeout) -> Result<()> {
    if in_isr() && !timeout.is_no_wait() {
        Err(Error::InvalidOperation)
    } else {
        Ok(())
    }
}

/// Refuse thread-only operations in interrupt context
pub(crate) fn check_thread_context() -> Result<()> {
    if in_isr() {
        Err(Error::InvalidOperation)
    } else {
        Ok(())
    }
}

/// Callback invoked on a plain event
pub type Callback = dyn Fn() + Send + Sync;

/// Callback invoked with a count (counter alarms)
pub type CountCallback = dyn Fn(u32) + Send + Sync;

/// At most one registered callback
///
/// Interrupt paths clone the callback out of the slot and call it after
/// the lock is released, so a callback may uninstall itself.
pub struct CallbackSlot<F: ?Sized> {
    slot: spin::Mutex<Option<Arc<F>>>,
}

impl<F: ?Sized> CallbackSlot<F> {
    pub const fn new() -> Self {
        Self {
            slot: spin::Mutex::new(None),
        }
    }

    /// Install `callback`; fails with `Busy` if one is already present
    pub fn install(&self, callback: Arc<F>) -> Result<()> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(Error::Busy);
        }
        *slot = Some(callback);
        Ok(())
    }

    /// Remove the callback, returning whether one was installed
    pub fn uninstall(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    pub fn get(&self) -> Option<Arc<F>> {
        self.slot.lock().clone()
    }

    pub fn is_installed(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<F: ?Sized> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wake-up for one waiting thread
///
/// Interrupt code calls [`Signal::notify`], which never blocks beyond a
/// spin lock. The waiter registers itself before polling, so a notify that
/// lands between the poll and the park is not lost.
#[derive(Default)]
pub struct Signal {
    waiter: spin::Mutex<Option<Thread>>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let waiter = self.waiter.lock().clone();
        if let Some(thread) = waiter {
            thread.unpark();
        }
    }

    /// Poll until `poll` yields a value or the deadline passes
    pub(crate) fn wait_for<T>(
        &self,
        deadline: Deadline,
        mut poll: impl FnMut() -> Option<T>,
    ) -> Option<T> {
        *self.waiter.lock() = Some(thread::current());
        let out = loop {
            if let Some(value) = poll() {
                break Some(value);
            }
            match deadline.instant() {
                None => thread::park(),
                Some(at) => {
                    let now = Instant::now();
                    if now >= at {
                        break None;
                    }
                    thread::park_timeout(at - now);
                }
            }
        };
        *self.waiter.lock() = None;
        out
    }
}

/// Bounded lock-free hand-off from interrupt context to a thread
///
/// Posting never blocks; when the queue is full the value is handed back
/// and the drop counter increments. One thread at a time may wait in
/// [`IsrChannel::recv`].
pub struct IsrChannel<T> {
    queue: ArrayQueue<T>,
    signal: Signal,
    dropped: AtomicU32,
}

impl<T> IsrChannel<T> {
    /// Channel holding up to `capacity` values
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            queue: ArrayQueue::new(capacity),
            signal: Signal::new(),
            dropped: AtomicU32::new(0),
        })
    }

    /// Queue a value; safe from interrupt context
    pub fn post(&self, value: T) -> core::result::Result<(), T> {
        let result = self.queue.push(value);
        if result.is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.signal.notify();
        result
    }

    pub fn try_recv(&self) -> Option<T> {
        self.queue.pop()
    }

    /// Take the oldest value, waiting up to `timeout`
    pub fn recv(&self, timeout: Timeout) -> Result<T> {
        if let Some(value) = self.queue.pop() {
            return Ok(value);
        }
        if timeout.is_no_wait() {
            return Err(Error::NoMessage);
        }
        check_blocking(timeout)?;
        self.signal
            .wait_for(Deadline::after(timeout), || self.queue.pop())
            .ok_or(Error::Timeout)
    }

    /// Discard everything queued, returning how many values were dropped
    pub fn clear(&self) -> usize {
        let mut n = 0;
        while self.queue.pop().is_some() {
            n += 1;
        }
        n
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Values refused because the channel was full
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn signal(&self) -> &Signal {
        &self.signal
    }
}
