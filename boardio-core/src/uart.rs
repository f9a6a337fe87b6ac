//! UART controller
//!
//! Received bytes are pushed by the driver from interrupt context into a
//! bounded lock-free ring of `read_buf_len` bytes. When the ring is full
//! new bytes are dropped and counted as overruns. A line fault reported by
//! the driver fails the next read with `Io`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use boardio_hal::{DeviceClass, DeviceId, Error, Result, Timeout, UartConfig, UartRx, UartTx};
use log::{debug, warn};

use crate::clock::Deadline;
use crate::context::Hal;
use crate::driver::{ByteSink, UartDriver};
use crate::irq::{self, IsrChannel};
use crate::registry::{HandleId, Lease};

struct RxPath {
    ring: IsrChannel<u8>,
    fault: AtomicBool,
}

impl RxPath {
    fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            ring: IsrChannel::new(capacity)?,
            fault: AtomicBool::new(false),
        })
    }

    /// Move buffered bytes into `buf`, returning how many were copied
    fn drain_into(&self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.ring.try_recv() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    fn take_fault(&self) -> bool {
        self.fault.swap(false, Ordering::AcqRel)
    }
}

impl ByteSink for RxPath {
    fn on_bytes(&self, data: &[u8]) {
        for &byte in data {
            // Refused bytes are counted by the ring
            let _ = self.ring.post(byte);
        }
    }

    fn on_fault(&self) {
        self.fault.store(true, Ordering::Release);
        self.ring.signal().notify();
    }
}

/// Handle to one UART port
pub struct Uart {
    lease: Lease,
    driver: Arc<dyn UartDriver>,
    config: UartConfig,
    rx: Arc<RxPath>,
}

impl Uart {
    /// Open port `id` with `config`
    pub fn open(hal: &Hal, id: DeviceId, config: UartConfig) -> Result<Self> {
        config.validate()?;
        let lease = hal.registry().open(DeviceClass::Uart, id)?;
        let driver = Arc::clone(&hal.board().uart);
        driver.configure(id, &config)?;
        let rx = Arc::new(RxPath::new(config.read_buf_len)?);
        driver.attach(id, rx.clone())?;
        debug!("uart{} open at {} baud", id, config.baud_rate);
        Ok(Self {
            lease,
            driver,
            config,
            rx,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.lease.id()
    }

    /// Registry session backing this handle
    pub fn handle(&self) -> HandleId {
        self.lease.handle()
    }

    pub fn current_config(&self) -> UartConfig {
        self.config
    }

    /// Apply a new configuration
    ///
    /// Changing `read_buf_len` replaces the receive ring and discards any
    /// buffered bytes.
    pub fn config(&mut self, config: UartConfig) -> Result<()> {
        self.lease.check()?;
        config.validate()?;
        self.driver.configure(self.id(), &config)?;
        if config.read_buf_len != self.config.read_buf_len {
            let rx = Arc::new(RxPath::new(config.read_buf_len)?);
            self.driver.attach(self.id(), rx.clone())?;
            self.rx = rx;
        }
        self.config = config;
        debug!("uart{} reconfigured: {:?}", self.id(), config);
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.lease.check()?;
        if data.is_empty() {
            return Ok(());
        }
        self.driver.transmit(self.id(), data)
    }

    pub fn char_put(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }

    /// Fill `buf`, waiting up to `timeout` for bytes to arrive
    ///
    /// Returns the number of bytes read, which is less than `buf.len()`
    /// when the wait expires. A pending line fault fails with `Io`.
    pub fn read(&mut self, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
        self.lease.check()?;
        irq::check_blocking(timeout)?;
        if self.rx.take_fault() {
            warn!("uart{} line fault", self.id());
            return Err(Error::Io);
        }
        let mut n = self.rx.drain_into(buf);
        if n == buf.len() || timeout.is_no_wait() {
            return Ok(n);
        }
        let rx = &self.rx;
        let deadline = Deadline::after(timeout);
        let _ = rx.ring.signal().wait_for(deadline, || {
            n += rx.drain_into(&mut buf[n..]);
            (n == buf.len() || rx.fault.load(Ordering::Acquire)).then_some(())
        });
        if n == 0 && rx.take_fault() {
            warn!("uart{} line fault", self.id());
            return Err(Error::Io);
        }
        Ok(n)
    }

    /// One byte, or `None` if nothing arrives before `timeout`
    pub fn char_get(&mut self, timeout: Timeout) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        let n = self.read(&mut byte, timeout)?;
        Ok((n == 1).then_some(byte[0]))
    }

    /// Bytes waiting in the receive ring
    pub fn remainder_get(&self) -> Result<usize> {
        self.lease.check()?;
        Ok(self.rx.ring.len())
    }

    /// Discard buffered bytes and any pending fault
    pub fn buffer_clear(&mut self) -> Result<()> {
        self.lease.check()?;
        let dropped = self.rx.ring.clear();
        self.rx.take_fault();
        debug!("uart{} cleared {} bytes", self.id(), dropped);
        Ok(())
    }

    /// Bytes dropped because the receive ring was full
    pub fn overruns(&self) -> u32 {
        self.rx.ring.dropped()
    }

    /// Wait until at least one byte is available, then take what is there
    fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.read(&mut buf[..1], Timeout::Forever)?;
            if n == 1 {
                return Ok(1 + self.rx.drain_into(&mut buf[1..]));
            }
        }
    }

    pub fn close(mut self) -> Result<()> {
        self.teardown();
        self.lease.close()
    }

    fn teardown(&mut self) {
        if self.lease.check().is_ok() {
            self.driver.detach(self.id());
        }
    }
}

impl Drop for Uart {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl UartTx for Uart {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        Uart::write(self, data)
    }
}

impl UartRx for Uart {
    fn read(&mut self, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
        Uart::read(self, buf, timeout)
    }
}

impl embedded_io::ErrorType for Uart {
    type Error = Error;
}

impl embedded_io::Read for Uart {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_some(buf)
    }
}

impl embedded_io::Write for Uart {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Uart::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.lease.check()
    }
}
