use std::sync::Arc;

use boardio_hal::{Error, Result, Timeout};
use log::debug;
use parking_lot::Condvar;

use crate::clock::Deadline;
use crate::irq;

#[derive(Debug)]
struct Ring {
    buf: Vec<u8>,
    msg_size: usize,
    depth: usize,
    head: usize,
    len: usize,
    // Bumped by purge so blocked callers can tell they were aborted
    epoch: u64,
}

impl Ring {
    fn slot(&self, index: usize) -> core::ops::Range<usize> {
        let start = (index % self.depth) * self.msg_size;
        start..start + self.msg_size
    }

    fn push(&mut self, msg: &[u8]) {
        let range = self.slot(self.head + self.len);
        self.buf[range].copy_from_slice(msg);
        self.len += 1;
    }

    fn front(&self, out: &mut [u8]) {
        let range = self.slot(self.head);
        out[..self.msg_size].copy_from_slice(&self.buf[range]);
    }

    fn pop(&mut self, out: &mut [u8]) {
        self.front(out);
        self.head = (self.head + 1) % self.depth;
        self.len -= 1;
    }
}

#[derive(Debug)]
struct Inner {
    ring: parking_lot::Mutex<Ring>,
    not_empty: Condvar,
    not_full: Condvar,
}

/// Bounded FIFO of fixed-size messages
///
/// Messages are copied in and out. With `NoWait` the queue may be used
/// from interrupt context.
#[derive(Debug, Clone)]
pub struct MessageQueue {
    inner: Arc<Inner>,
}

impl MessageQueue {
    /// Queue of `depth` messages of `msg_size` bytes each
    pub fn new(msg_size: usize, depth: usize) -> Result<Self> {
        if msg_size == 0 || depth == 0 {
            return Err(Error::InvalidArgument);
        }
        let bytes = msg_size.checked_mul(depth).ok_or(Error::InvalidArgument)?;
        Ok(Self {
            inner: Arc::new(Inner {
                ring: parking_lot::Mutex::new(Ring {
                    buf: vec![0; bytes],
                    msg_size,
                    depth,
                    head: 0,
                    len: 0,
                    epoch: 0,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
        })
    }

    /// Append `msg`, which must be exactly one message long
    ///
    /// When full: `Busy` with `NoWait`, `Timeout` once a bounded wait
    /// expires, `NoMessage` if a purge aborts the wait.
    pub fn send(&self, msg: &[u8], timeout: Timeout) -> Result<()> {
        irq::check_blocking(timeout)?;
        let deadline = Deadline::after(timeout);
        let mut ring = self.inner.ring.lock();
        if msg.len() != ring.msg_size {
            return Err(Error::InvalidArgument);
        }
        let epoch = ring.epoch;
        loop {
            if ring.len < ring.depth {
                ring.push(msg);
                self.inner.not_empty.notify_one();
                return Ok(());
            }
            if timeout.is_no_wait() {
                return Err(Error::Busy);
            }
            let timed_out = deadline.wait(&self.inner.not_full, &mut ring);
            if ring.epoch != epoch {
                return Err(Error::NoMessage);
            }
            if timed_out && ring.len == ring.depth {
                return Err(Error::Timeout);
            }
        }
    }

    /// Remove the oldest message into `buf`
    ///
    /// When empty: `NoMessage` with `NoWait` or after a purge, `Timeout`
    /// once a bounded wait expires.
    pub fn recv(&self, buf: &mut [u8], timeout: Timeout) -> Result<()> {
        irq::check_blocking(timeout)?;
        let deadline = Deadline::after(timeout);
        let mut ring = self.inner.ring.lock();
        if buf.len() < ring.msg_size {
            return Err(Error::InvalidArgument);
        }
        let epoch = ring.epoch;
        loop {
            if ring.len > 0 {
                ring.pop(buf);
                self.inner.not_full.notify_one();
                return Ok(());
            }
            if timeout.is_no_wait() {
                return Err(Error::NoMessage);
            }
            let timed_out = deadline.wait(&self.inner.not_empty, &mut ring);
            if ring.epoch != epoch {
                return Err(Error::NoMessage);
            }
            if timed_out && ring.len == 0 {
                return Err(Error::Timeout);
            }
        }
    }

    /// Copy the oldest message into `buf` without removing it
    pub fn peek(&self, buf: &mut [u8]) -> Result<()> {
        let ring = self.inner.ring.lock();
        if buf.len() < ring.msg_size {
            return Err(Error::InvalidArgument);
        }
        if ring.len == 0 {
            return Err(Error::NoMessage);
        }
        ring.front(buf);
        Ok(())
    }

    /// Discard every queued message and abort all waiters
    pub fn purge(&self) {
        let mut ring = self.inner.ring.lock();
        let dropped = ring.len;
        ring.head = 0;
        ring.len = 0;
        ring.epoch = ring.epoch.wrapping_add(1);
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
        debug!("message queue purged ({} messages)", dropped);
    }

    /// Messages currently queued
    pub fn len(&self) -> usize {
        self.inner.ring.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued messages
    pub fn capacity(&self) -> usize {
        self.inner.ring.lock().depth
    }

    pub fn msg_size(&self) -> usize {
        self.inner.ring.lock().msg_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let q = MessageQueue::new(2, 3).unwrap();
        q.send(&[1, 1], Timeout::NoWait).unwrap();
        q.send(&[2, 2], Timeout::NoWait).unwrap();
        q.send(&[3, 3], Timeout::NoWait).unwrap();
        assert_eq!(q.send(&[4, 4], Timeout::NoWait), Err(Error::Busy));
        let mut buf = [0u8; 2];
        q.peek(&mut buf).unwrap();
        assert_eq!(buf, [1, 1]);
        for expected in 1..=3u8 {
            q.recv(&mut buf, Timeout::NoWait).unwrap();
            assert_eq!(buf, [expected; 2]);
        }
        assert_eq!(q.recv(&mut buf, Timeout::NoWait), Err(Error::NoMessage));
    }

    #[test]
    fn test_wraps_around() {
        let q = MessageQueue::new(1, 2).unwrap();
        let mut buf = [0u8; 1];
        for i in 0..10u8 {
            q.send(&[i], Timeout::NoWait).unwrap();
            q.recv(&mut buf, Timeout::NoWait).unwrap();
            assert_eq!(buf[0], i);
        }
    }

    #[test]
    fn test_size_mismatch() {
        let q = MessageQueue::new(4, 1).unwrap();
        assert_eq!(q.send(&[0; 3], Timeout::NoWait), Err(Error::InvalidArgument));
        let mut small = [0u8; 3];
        assert_eq!(q.recv(&mut small, Timeout::NoWait), Err(Error::InvalidArgument));
        assert!(MessageQueue::new(0, 1).is_err());
        assert!(MessageQueue::new(1, 0).is_err());
    }

    #[test]
    fn test_bounded_waits_time_out() {
        let q = MessageQueue::new(1, 1).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(q.recv(&mut buf, Timeout::Millis(10)), Err(Error::Timeout));
        q.send(&[9], Timeout::NoWait).unwrap();
        assert_eq!(q.send(&[9], Timeout::Millis(10)), Err(Error::Timeout));
    }

    #[test]
    fn test_purge_aborts_receiver() {
        let q = MessageQueue::new(1, 2).unwrap();
        let waiter = q.clone();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 1];
            waiter.recv(&mut buf, Timeout::Forever)
        });
        while !handle.is_finished() {
            thread::sleep(Duration::from_millis(5));
            q.purge();
        }
        assert_eq!(handle.join().unwrap(), Err(Error::NoMessage));
    }

    #[test]
    fn test_send_from_isr_wakes_receiver() {
        let q = MessageQueue::new(2, 1).unwrap();
        let producer = q.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            irq::isr(|| producer.send(&[7, 8], Timeout::NoWait))
        });
        let mut buf = [0u8; 2];
        q.recv(&mut buf, Timeout::Millis(2_000)).unwrap();
        assert_eq!(buf, [7, 8]);
        handle.join().unwrap().unwrap();
    }
}
