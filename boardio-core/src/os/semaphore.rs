use std::sync::Arc;

use boardio_hal::{Error, Result, Timeout};
use log::debug;
use parking_lot::Condvar;

use crate::clock::Deadline;
use crate::irq;

#[derive(Debug)]
struct State {
    count: u32,
    limit: u32,
    // Bumped by reset so blocked takers can tell they were aborted
    epoch: u64,
}

#[derive(Debug)]
struct Inner {
    state: parking_lot::Mutex<State>,
    available: Condvar,
}

/// Counting semaphore bounded by a limit
///
/// `give` is safe from interrupt context; `take` only with `NoWait` there.
#[derive(Debug, Clone)]
pub struct Semaphore {
    inner: Arc<Inner>,
}

impl Semaphore {
    /// Fails if `limit` is zero or `initial` exceeds it
    pub fn new(initial: u32, limit: u32) -> Result<Self> {
        if limit == 0 || initial > limit {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            inner: Arc::new(Inner {
                state: parking_lot::Mutex::new(State {
                    count: initial,
                    limit,
                    epoch: 0,
                }),
                available: Condvar::new(),
            }),
        })
    }

    /// Take one unit, waiting up to `timeout`
    ///
    /// `Busy` when none is available and `timeout` is `NoWait`; `Timeout`
    /// when the wait expires or a reset aborts it.
    pub fn take(&self, timeout: Timeout) -> Result<()> {
        irq::check_blocking(timeout)?;
        let deadline = Deadline::after(timeout);
        let mut state = self.inner.state.lock();
        if state.count > 0 {
            state.count -= 1;
            return Ok(());
        }
        if timeout.is_no_wait() {
            return Err(Error::Busy);
        }
        let epoch = state.epoch;
        loop {
            let timed_out = deadline.wait(&self.inner.available, &mut state);
            if state.epoch != epoch {
                return Err(Error::Timeout);
            }
            if state.count > 0 {
                state.count -= 1;
                return Ok(());
            }
            if timed_out {
                return Err(Error::Timeout);
            }
        }
    }

    /// Return one unit; the count saturates at the limit
    pub fn give(&self) {
        let mut state = self.inner.state.lock();
        if state.count < state.limit {
            state.count += 1;
        }
        self.inner.available.notify_one();
    }

    /// Zero the count and abort every pending take
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        state.count = 0;
        state.epoch = state.epoch.wrapping_add(1);
        self.inner.available.notify_all();
        debug!("semaphore reset");
    }

    pub fn count(&self) -> u32 {
        self.inner.state.lock().count
    }

    pub fn limit(&self) -> u32 {
        self.inner.state.lock().limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_counting() {
        let sem = Semaphore::new(2, 2).unwrap();
        sem.take(Timeout::NoWait).unwrap();
        sem.take(Timeout::NoWait).unwrap();
        assert_eq!(sem.take(Timeout::NoWait), Err(Error::Busy));
        assert_eq!(sem.take(Timeout::Millis(10)), Err(Error::Timeout));
    }

    #[test]
    fn test_give_saturates() {
        let sem = Semaphore::new(0, 1).unwrap();
        sem.give();
        sem.give();
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(Semaphore::new(0, 0).is_err());
        assert!(Semaphore::new(3, 2).is_err());
    }

    #[test]
    fn test_give_wakes_taker() {
        let sem = Semaphore::new(0, 1).unwrap();
        let giver = sem.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            irq::isr(|| giver.give());
        });
        assert_eq!(sem.take(Timeout::Millis(2_000)), Ok(()));
        handle.join().unwrap();
    }

    #[test]
    fn test_reset_aborts_waiters() {
        let sem = Semaphore::new(0, 4).unwrap();
        let waiter = sem.clone();
        let handle = thread::spawn(move || waiter.take(Timeout::Forever));
        while !handle.is_finished() {
            thread::sleep(Duration::from_millis(5));
            sem.reset();
        }
        assert_eq!(handle.join().unwrap(), Err(Error::Timeout));
        assert_eq!(sem.count(), 0);
    }

    #[test]
    fn test_blocking_take_refused_in_isr() {
        let sem = Semaphore::new(1, 1).unwrap();
        irq::isr(|| {
            assert_eq!(sem.take(Timeout::Forever), Err(Error::InvalidOperation));
            assert_eq!(sem.take(Timeout::NoWait), Ok(()));
        });
    }
}
