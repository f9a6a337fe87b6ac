use std::sync::Arc;
use std::thread::{self, ThreadId};

use boardio_hal::{Error, Result, Timeout};
use parking_lot::Condvar;

use crate::clock::Deadline;
use crate::irq;

#[derive(Debug, Default)]
struct State {
    owner: Option<ThreadId>,
    depth: u32,
}

#[derive(Debug, Default)]
struct Inner {
    state: parking_lot::Mutex<State>,
    released: Condvar,
}

/// Recursive mutex owned by the locking task
///
/// The owner may lock again; it must unlock as many times as it locked.
/// Clones refer to the same mutex.
#[derive(Debug, Clone, Default)]
pub struct Mutex {
    inner: Arc<Inner>,
}

impl Mutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire, waiting up to `timeout` for another owner to release
    ///
    /// Fails with `Busy` if held elsewhere and `timeout` is `NoWait`, and
    /// with `Timeout` when a bounded wait expires.
    pub fn lock(&self, timeout: Timeout) -> Result<()> {
        irq::check_thread_context()?;
        let me = thread::current().id();
        let deadline = Deadline::after(timeout);
        let mut state = self.inner.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    return Ok(());
                }
                Some(owner) if owner == me => {
                    state.depth = state.depth.checked_add(1).ok_or(Error::Busy)?;
                    return Ok(());
                }
                Some(_) if timeout.is_no_wait() => return Err(Error::Busy),
                Some(_) => {
                    if deadline.wait(&self.inner.released, &mut state) && state.owner.is_some() {
                        return Err(Error::Timeout);
                    }
                }
            }
        }
    }

    /// Release one level of ownership
    pub fn unlock(&self) -> Result<()> {
        irq::check_thread_context()?;
        let me = thread::current().id();
        let mut state = self.inner.state.lock();
        match state.owner {
            None => Err(Error::InvalidState),
            Some(owner) if owner != me => Err(Error::PermissionDenied),
            Some(_) => {
                state.depth -= 1;
                if state.depth == 0 {
                    state.owner = None;
                    self.inner.released.notify_one();
                }
                Ok(())
            }
        }
    }

    /// Current recursion depth (0 when unlocked)
    pub fn lock_count(&self) -> u32 {
        self.inner.state.lock().depth
    }

    /// Whether the calling task owns the mutex
    pub fn is_owned_by_current(&self) -> bool {
        self.inner.state.lock().owner == Some(thread::current().id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_recursive_lock() {
        let m = Mutex::new();
        m.lock(Timeout::Forever).unwrap();
        m.lock(Timeout::NoWait).unwrap();
        assert_eq!(m.lock_count(), 2);
        m.unlock().unwrap();
        assert!(m.is_owned_by_current());
        m.unlock().unwrap();
        assert_eq!(m.lock_count(), 0);
        assert_eq!(m.unlock(), Err(Error::InvalidState));
    }

    #[test]
    fn test_contention() {
        let m = Mutex::new();
        m.lock(Timeout::Forever).unwrap();
        let other = m.clone();
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            tx.send(other.lock(Timeout::NoWait)).unwrap();
            tx.send(other.lock(Timeout::Millis(20))).unwrap();
            tx.send(other.unlock()).unwrap();
            tx.send(other.lock(Timeout::Forever)).unwrap();
            other.unlock().unwrap();
        });
        assert_eq!(rx.recv().unwrap(), Err(Error::Busy));
        assert_eq!(rx.recv().unwrap(), Err(Error::Timeout));
        assert_eq!(rx.recv().unwrap(), Err(Error::PermissionDenied));
        m.unlock().unwrap();
        assert_eq!(rx.recv().unwrap(), Ok(()));
        handle.join().unwrap();
    }

    #[test]
    fn test_refused_in_isr() {
        let m = Mutex::new();
        irq::isr(|| {
            assert_eq!(m.lock(Timeout::NoWait), Err(Error::InvalidOperation));
            assert_eq!(m.unlock(), Err(Error::InvalidOperation));
        });
    }
}
