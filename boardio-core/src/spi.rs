//! SPI controller
//!
//! Synchronous transfers run on the caller. Asynchronous transfers run on
//! a worker thread, at most one per direction, and report completion by
//! calling that direction's notify callback in interrupt context. The
//! outcome is collected afterwards with [`Spi::take_async_read`] or
//! [`Spi::async_write_result`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use boardio_hal::spi::FILL_BYTE;
use boardio_hal::{DeviceClass, DeviceId, Error, Result, SpiBus, SpiConfig, Timeout};
use log::{debug, warn};

use crate::context::Hal;
use crate::driver::SpiDriver;
use crate::irq;
use crate::os::Semaphore;
use crate::registry::{HandleId, Lease};

/// Completion callback for an asynchronous transfer
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// State of one asynchronous direction
struct AsyncLane<T> {
    notify: Option<Notify>,
    // Holds one unit while idle; taken for the duration of a transfer
    idle: Semaphore,
    result: Arc<spin::Mutex<Option<Result<T>>>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> AsyncLane<T> {
    fn new(notify: Option<Notify>) -> Result<Self> {
        Ok(Self {
            notify,
            idle: Semaphore::new(1, 1)?,
            result: Arc::new(spin::Mutex::new(None)),
            worker: None,
        })
    }

    fn is_busy(&self) -> bool {
        self.idle.count() == 0
    }

    /// Run `job` on a worker thread; `Busy` while a previous job runs
    fn spawn(
        &mut self,
        name: String,
        job: impl FnOnce() -> Result<T> + Send + 'static,
    ) -> Result<()> {
        self.idle.take(Timeout::NoWait)?;
        *self.result.lock() = None;
        let idle = self.idle.clone();
        let notify = self.notify.clone();
        let result = Arc::clone(&self.result);
        let spawned = thread::Builder::new().name(name).spawn(move || {
            let outcome = job();
            *result.lock() = Some(outcome);
            // The lane stays busy until the completion has been delivered
            if let Some(notify) = notify {
                irq::isr(|| notify());
            }
            idle.give();
        });
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                warn!("spi worker failed to start: {}", e);
                self.idle.give();
                Err(Error::Busy)
            }
        }
    }

    fn take_result(&self) -> Option<Result<T>> {
        self.result.lock().take()
    }

    /// Wait for an outstanding job
    fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// Handle to one SPI bus
pub struct Spi {
    lease: Lease,
    driver: Arc<dyn SpiDriver>,
    config: SpiConfig,
    write_lane: AsyncLane<()>,
    read_lane: AsyncLane<Vec<u8>>,
}

impl Spi {
    /// Open bus `id` with `config`
    ///
    /// The notify callbacks, when given, run after each asynchronous write
    /// or read completes.
    pub fn open(
        hal: &Hal,
        id: DeviceId,
        config: SpiConfig,
        write_notify: Option<Notify>,
        read_notify: Option<Notify>,
    ) -> Result<Self> {
        config.validate()?;
        let lease = hal.registry().open(DeviceClass::Spi, id)?;
        let driver = Arc::clone(&hal.board().spi);
        driver.configure(id, &config)?;
        Ok(Self {
            lease,
            driver,
            config,
            write_lane: AsyncLane::new(write_notify)?,
            read_lane: AsyncLane::new(read_notify)?,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.lease.id()
    }

    /// Registry session backing this handle
    pub fn handle(&self) -> HandleId {
        self.lease.handle()
    }

    pub fn current_config(&self) -> SpiConfig {
        self.config
    }

    pub fn config(&mut self, config: SpiConfig) -> Result<()> {
        self.lease.check()?;
        config.validate()?;
        self.driver.configure(self.id(), &config)?;
        self.config = config;
        debug!(
            "spi{} configured: {} Hz {:?}",
            self.id(),
            config.frequency,
            config.mode()
        );
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.transceive(data, &mut [])
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.transceive(&[], buf)
    }

    /// Clock `max(tx.len(), rx.len())` bytes
    ///
    /// `tx` is padded with the fill byte; received bytes beyond `rx` are
    /// discarded.
    pub fn transceive(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        self.lease.check()?;
        let len = tx.len().max(rx.len());
        if len == 0 {
            return Ok(());
        }
        if tx.len() == rx.len() {
            return self.driver.transfer(self.id(), tx, rx);
        }
        let mut out = vec![FILL_BYTE; len];
        out[..tx.len()].copy_from_slice(tx);
        let mut input = vec![0u8; len];
        self.driver.transfer(self.id(), &out, &mut input)?;
        rx.copy_from_slice(&input[..rx.len()]);
        Ok(())
    }

    /// Start transmitting `data` in the background
    pub fn async_write(&mut self, data: Vec<u8>) -> Result<()> {
        self.lease.check()?;
        let driver = Arc::clone(&self.driver);
        let id = self.id();
        self.write_lane.spawn(format!("spi{}-tx", id), move || {
            let mut discard = vec![0u8; data.len()];
            driver.transfer(id, &data, &mut discard)
        })
    }

    /// Start receiving `len` bytes in the background
    pub fn async_read(&mut self, len: usize) -> Result<()> {
        self.lease.check()?;
        let driver = Arc::clone(&self.driver);
        let id = self.id();
        self.read_lane.spawn(format!("spi{}-rx", id), move || {
            let fill = vec![FILL_BYTE; len];
            let mut buf = vec![0u8; len];
            driver.transfer(id, &fill, &mut buf).map(|_| buf)
        })
    }

    /// Buffer from the last completed asynchronous read, once
    pub fn take_async_read(&mut self) -> Option<Result<Vec<u8>>> {
        self.read_lane.take_result()
    }

    /// Outcome of the last completed asynchronous write, once
    pub fn async_write_result(&mut self) -> Option<Result<()>> {
        self.write_lane.take_result()
    }

    pub fn is_write_busy(&self) -> bool {
        self.write_lane.is_busy()
    }

    pub fn is_read_busy(&self) -> bool {
        self.read_lane.is_busy()
    }

    /// Wait for outstanding asynchronous transfers and release the bus
    pub fn close(mut self) -> Result<()> {
        self.teardown();
        self.lease.close()
    }

    fn teardown(&mut self) {
        self.write_lane.join();
        self.read_lane.join();
    }
}

impl Drop for Spi {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl SpiBus for Spi {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        Spi::write(self, data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        Spi::read(self, buf)
    }

    fn transceive(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        Spi::transceive(self, write, read)
    }
}

impl embedded_hal::spi::ErrorType for Spi {
    type Error = Error;
}

impl embedded_hal::spi::SpiBus<u8> for Spi {
    fn read(&mut self, words: &mut [u8]) -> Result<()> {
        Spi::read(self, words)
    }

    fn write(&mut self, words: &[u8]) -> Result<()> {
        Spi::write(self, words)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<()> {
        Spi::transceive(self, write, read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<()> {
        let out = words.to_vec();
        Spi::transceive(self, &out, words)
    }

    fn flush(&mut self) -> Result<()> {
        self.lease.check()
    }
}
