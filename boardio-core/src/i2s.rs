//! I2S controller
//!
//! Each direction runs its own trigger state machine. Received samples
//! are cut into `block_size` blocks in interrupt context and queued in a
//! [`MessageQueue`]; a full queue is an overrun and moves rx to `Error`.
//! Transmit blocks written before `Start` are held and sent when the
//! stream starts.

use std::collections::VecDeque;
use std::sync::Arc;

use boardio_hal::i2s::{I2sConfig, I2sDir, I2sState, I2sTrigger};
use boardio_hal::{DeviceClass, DeviceId, Error, Result, Timeout};
use log::{debug, warn};

use crate::context::Hal;
use crate::driver::{ByteSink, I2sDriver};
use crate::os::MessageQueue;
use crate::registry::{HandleId, Lease};

/// Received blocks buffered per interface
pub const RX_QUEUE_DEPTH: usize = 4;
/// Transmit blocks held before `Start`
pub const TX_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
struct Stream {
    state: I2sState,
    config: Option<I2sConfig>,
}

impl Stream {
    fn configured(&self) -> Result<I2sConfig> {
        self.config.ok_or(Error::InvalidState)
    }
}

struct RxPath {
    stream: spin::Mutex<Stream>,
    queue: spin::Mutex<Option<MessageQueue>>,
    // Bytes of an incomplete block
    partial: spin::Mutex<Vec<u8>>,
}

impl RxPath {
    fn overrun(&self) {
        self.stream.lock().state = I2sState::Error;
        warn!("i2s rx overrun");
    }

    fn discard(&self) {
        if let Some(queue) = self.queue.lock().as_ref() {
            queue.purge();
        }
        self.partial.lock().clear();
    }
}

impl ByteSink for RxPath {
    fn on_bytes(&self, data: &[u8]) {
        let queue = match (self.stream.lock().state, self.queue.lock().clone()) {
            (I2sState::Running, Some(queue)) => queue,
            _ => return,
        };
        let block = queue.msg_size();
        let mut partial = self.partial.lock();
        partial.extend_from_slice(data);
        while partial.len() >= block {
            if queue.send(&partial[..block], Timeout::NoWait).is_err() {
                partial.clear();
                drop(partial);
                self.overrun();
                return;
            }
            partial.drain(..block);
        }
    }

    fn on_fault(&self) {
        self.overrun();
    }
}

/// Handle to one I2S interface
pub struct I2s {
    lease: Lease,
    driver: Arc<dyn I2sDriver>,
    tx: Stream,
    held: VecDeque<Vec<u8>>,
    rx: Arc<RxPath>,
}

impl I2s {
    pub fn open(hal: &Hal, id: DeviceId) -> Result<Self> {
        let lease = hal.registry().open(DeviceClass::I2s, id)?;
        let driver = Arc::clone(&hal.board().i2s);
        let rx = Arc::new(RxPath {
            stream: spin::Mutex::new(Stream::default()),
            queue: spin::Mutex::new(None),
            partial: spin::Mutex::new(Vec::new()),
        });
        driver.attach_rx(id, rx.clone())?;
        Ok(Self {
            lease,
            driver,
            tx: Stream::default(),
            held: VecDeque::new(),
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

    /// Configure one or both directions
    ///
    /// Only streams that are not ready or ready may be reconfigured.
    pub fn config_set(&mut self, dir: I2sDir, config: I2sConfig) -> Result<()> {
        self.lease.check()?;
        config.validate()?;
        if dir.includes_rx() && !self.rx.stream.lock().state.accepts_config() {
            return Err(Error::InvalidState);
        }
        if dir.includes_tx() && !self.tx.state.accepts_config() {
            return Err(Error::InvalidState);
        }
        self.driver.configure(self.id(), dir, &config)?;
        if dir.includes_rx() {
            let queue = MessageQueue::new(config.block_size, RX_QUEUE_DEPTH)?;
            *self.rx.stream.lock() = Stream {
                state: I2sState::Ready,
                config: Some(config),
            };
            *self.rx.queue.lock() = Some(queue);
            self.rx.partial.lock().clear();
        }
        if dir.includes_tx() {
            self.tx = Stream {
                state: I2sState::Ready,
                config: Some(config),
            };
            self.held.clear();
        }
        debug!(
            "i2s{} {:?} configured: {} Hz, {} bit, {} ch",
            self.id(),
            dir,
            config.sample_rate,
            config.sample_bits,
            config.channels
        );
        Ok(())
    }

    /// Configuration of one direction, `None` until configured
    pub fn config_get(&self, dir: I2sDir) -> Result<Option<I2sConfig>> {
        self.lease.check()?;
        match dir {
            I2sDir::Rx => Ok(self.rx.stream.lock().config),
            I2sDir::Tx => Ok(self.tx.config),
            I2sDir::Both => Err(Error::InvalidArgument),
        }
    }

    pub fn status_get(&self, dir: I2sDir) -> Result<I2sState> {
        self.lease.check()?;
        match dir {
            I2sDir::Rx => Ok(self.rx.stream.lock().state),
            I2sDir::Tx => Ok(self.tx.state),
            I2sDir::Both => Err(Error::InvalidArgument),
        }
    }

    /// Apply a trigger command
    ///
    /// With `Both`, the command must be legal for both directions or
    /// neither changes. Transmission is synchronous, so a stopping stream
    /// settles to `Ready` before this returns.
    pub fn trigger(&mut self, dir: I2sDir, cmd: I2sTrigger) -> Result<()> {
        self.lease.check()?;
        let rx_next = if dir.includes_rx() {
            Some(self.rx.stream.lock().state.trigger(cmd)?)
        } else {
            None
        };
        let tx_next = if dir.includes_tx() {
            Some(self.tx.state.trigger(cmd)?)
        } else {
            None
        };
        self.driver.trigger(self.id(), dir, cmd)?;

        if rx_next.is_some() {
            // Re-evaluated under one lock: an rx fault may have landed
            // while the driver handled the command
            let mut stream = self.rx.stream.lock();
            let next = match stream.state.trigger(cmd) {
                Ok(next) => next,
                Err(_) if stream.state == I2sState::Error => return Err(Error::Io),
                Err(e) => return Err(e),
            };
            if cmd == I2sTrigger::Drop {
                self.rx.discard();
            }
            stream.state = settle(next);
        }
        if let Some(next) = tx_next {
            self.tx.state = settle(next);
            match cmd {
                I2sTrigger::Start | I2sTrigger::Drain => self.flush_held()?,
                I2sTrigger::Stop | I2sTrigger::Drop => self.held.clear(),
                I2sTrigger::Prepare => {}
            }
        }
        debug!("i2s{} {:?} {:?}", self.id(), dir, cmd);
        Ok(())
    }

    /// Queue or send one transmit block of at most `block_size` bytes
    ///
    /// Before `Start` up to [`TX_QUEUE_DEPTH`] blocks are held; one more is
    /// `Busy`. A driver failure moves tx to `Error`.
    pub fn write(&mut self, block: &[u8]) -> Result<()> {
        self.lease.check()?;
        let config = self.tx.configured()?;
        if block.len() > config.block_size {
            return Err(Error::InvalidArgument);
        }
        match self.tx.state {
            I2sState::Error => Err(Error::Io),
            I2sState::Ready => {
                if self.held.len() >= TX_QUEUE_DEPTH {
                    return Err(Error::Busy);
                }
                self.held.push_back(block.to_vec());
                Ok(())
            }
            I2sState::Running => self.transmit(block),
            _ => Err(Error::InvalidState),
        }
    }

    /// Take the oldest received block into `buf`, returning its length
    ///
    /// Waits up to the configured rx timeout. `buf` must hold a whole
    /// block.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.lease.check()?;
        let stream = *self.rx.stream.lock();
        let config = stream.configured()?;
        if buf.len() < config.block_size {
            return Err(Error::InvalidArgument);
        }
        let queue = self.rx.queue.lock().clone().ok_or(Error::InvalidState)?;
        match stream.state {
            I2sState::Error => return Err(Error::Io),
            I2sState::Running => {}
            _ if queue.is_empty() => return Err(Error::InvalidState),
            _ => {}
        }
        queue.recv(buf, config.timeout)?;
        Ok(config.block_size)
    }

    fn transmit(&mut self, block: &[u8]) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.driver.transmit(self.id(), block) {
            warn!("i2s{} tx underrun: {}", self.id(), e);
            self.tx.state = I2sState::Error;
            return Err(Error::Io);
        }
        Ok(())
    }

    fn flush_held(&mut self) -> Result<()> {
        while let Some(block) = self.held.pop_front() {
            self.transmit(&block)?;
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.teardown();
        self.lease.close()
    }

    fn teardown(&mut self) {
        self.rx.discard();
        if self.lease.check().is_ok() {
            self.driver.detach_rx(self.id());
        }
    }
}

impl Drop for I2s {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn settle(state: I2sState) -> I2sState {
    match state {
        I2sState::Stopping => I2sState::Ready,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sim_hal;

    fn small() -> I2sConfig {
        I2sConfig {
            block_size: 4,
            timeout: Timeout::Millis(20),
            ..I2sConfig::default()
        }
    }

    #[test]
    fn test_loopback_stream() {
        let (hal, sim) = sim_hal();
        sim.i2s.set_loopback(0, true).unwrap();
        let mut i2s = I2s::open(&hal, 0).unwrap();
        i2s.config_set(I2sDir::Both, small()).unwrap();
        assert_eq!(i2s.status_get(I2sDir::Tx), Ok(I2sState::Ready));
        i2s.trigger(I2sDir::Both, I2sTrigger::Start).unwrap();
        i2s.write(&[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(i2s.read(&mut buf), Ok(4));
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(sim.i2s.take_tx(0).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(i2s.read(&mut buf), Err(Error::Timeout));
    }

    #[test]
    fn test_partial_blocks_accumulate() {
        let (hal, sim) = sim_hal();
        let mut i2s = I2s::open(&hal, 0).unwrap();
        i2s.config_set(I2sDir::Rx, small()).unwrap();
        i2s.trigger(I2sDir::Rx, I2sTrigger::Start).unwrap();
        sim.i2s.inject(0, &[1, 2, 3]).unwrap();
        sim.i2s.inject(0, &[4, 5]).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(i2s.read(&mut buf), Ok(4));
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_held_blocks_sent_on_start() {
        let (hal, sim) = sim_hal();
        let mut i2s = I2s::open(&hal, 0).unwrap();
        i2s.config_set(I2sDir::Tx, small()).unwrap();
        for n in 0..TX_QUEUE_DEPTH as u8 {
            i2s.write(&[n; 4]).unwrap();
        }
        assert_eq!(i2s.write(&[9; 4]), Err(Error::Busy));
        assert!(sim.i2s.take_tx(0).unwrap().is_empty());
        i2s.trigger(I2sDir::Tx, I2sTrigger::Start).unwrap();
        assert_eq!(sim.i2s.take_tx(0).unwrap().len(), 4 * TX_QUEUE_DEPTH);
        assert_eq!(i2s.write(&[0; 5]), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_illegal_triggers() {
        let (hal, sim) = sim_hal();
        let mut i2s = I2s::open(&hal, 0).unwrap();
        assert_eq!(
            i2s.trigger(I2sDir::Tx, I2sTrigger::Start),
            Err(Error::InvalidState)
        );
        i2s.config_set(I2sDir::Tx, small()).unwrap();
        assert_eq!(
            i2s.trigger(I2sDir::Tx, I2sTrigger::Stop),
            Err(Error::InvalidState)
        );
        assert_eq!(
            i2s.trigger(I2sDir::Tx, I2sTrigger::Prepare),
            Err(Error::InvalidState)
        );
        // rx is not configured, so Both fails as a whole
        assert_eq!(
            i2s.trigger(I2sDir::Both, I2sTrigger::Start),
            Err(Error::InvalidState)
        );
        assert_eq!(i2s.status_get(I2sDir::Tx), Ok(I2sState::Ready));
        assert!(sim.i2s.triggers(0).unwrap().is_empty());
    }

    #[test]
    fn test_overrun_and_recovery() {
        let (hal, sim) = sim_hal();
        let mut i2s = I2s::open(&hal, 0).unwrap();
        i2s.config_set(I2sDir::Rx, small()).unwrap();
        i2s.trigger(I2sDir::Rx, I2sTrigger::Start).unwrap();
        let flood = vec![7u8; 4 * (RX_QUEUE_DEPTH + 1)];
        sim.i2s.inject(0, &flood).unwrap();
        assert_eq!(i2s.status_get(I2sDir::Rx), Ok(I2sState::Error));
        let mut buf = [0u8; 4];
        assert_eq!(i2s.read(&mut buf), Err(Error::Io));
        assert_eq!(
            i2s.config_set(I2sDir::Rx, small()),
            Err(Error::InvalidState)
        );
        i2s.trigger(I2sDir::Rx, I2sTrigger::Prepare).unwrap();
        assert_eq!(i2s.status_get(I2sDir::Rx), Ok(I2sState::Ready));
    }

    /// Raises an rx overrun from inside `Stop`
    struct FaultOnStop(Arc<crate::sim::SimI2s>);

    impl I2sDriver for FaultOnStop {
        fn configure(&self, id: DeviceId, dir: I2sDir, config: &I2sConfig) -> Result<()> {
            self.0.configure(id, dir, config)
        }

        fn trigger(&self, id: DeviceId, dir: I2sDir, cmd: I2sTrigger) -> Result<()> {
            if cmd == I2sTrigger::Stop {
                self.0.inject_fault(id)?;
            }
            self.0.trigger(id, dir, cmd)
        }

        fn transmit(&self, id: DeviceId, block: &[u8]) -> Result<()> {
            self.0.transmit(id, block)
        }

        fn attach_rx(&self, id: DeviceId, sink: Arc<dyn ByteSink>) -> Result<()> {
            self.0.attach_rx(id, sink)
        }

        fn detach_rx(&self, id: DeviceId) {
            self.0.detach_rx(id)
        }
    }

    #[test]
    fn test_fault_during_trigger_is_kept() {
        let config = crate::config::BoardConfig::simulated();
        let sim = crate::sim::SimBoard::new(&config);
        let mut board = sim.board();
        board.i2s = Arc::new(FaultOnStop(Arc::clone(&sim.i2s)));
        let hal = Hal::new(config, board).unwrap();

        let mut i2s = I2s::open(&hal, 0).unwrap();
        i2s.config_set(I2sDir::Rx, small()).unwrap();
        i2s.trigger(I2sDir::Rx, I2sTrigger::Start).unwrap();
        assert_eq!(i2s.trigger(I2sDir::Rx, I2sTrigger::Stop), Err(Error::Io));
        assert_eq!(i2s.status_get(I2sDir::Rx), Ok(I2sState::Error));
        i2s.trigger(I2sDir::Rx, I2sTrigger::Prepare).unwrap();
        assert_eq!(i2s.status_get(I2sDir::Rx), Ok(I2sState::Ready));
    }

    #[test]
    fn test_stop_keeps_blocks_drop_discards() {
        let (hal, sim) = sim_hal();
        let mut i2s = I2s::open(&hal, 0).unwrap();
        i2s.config_set(I2sDir::Rx, small()).unwrap();
        i2s.trigger(I2sDir::Rx, I2sTrigger::Start).unwrap();
        sim.i2s.inject(0, &[1; 8]).unwrap();
        i2s.trigger(I2sDir::Rx, I2sTrigger::Stop).unwrap();
        assert_eq!(i2s.status_get(I2sDir::Rx), Ok(I2sState::Ready));
        let mut buf = [0u8; 4];
        assert_eq!(i2s.read(&mut buf), Ok(4));
        i2s.trigger(I2sDir::Rx, I2sTrigger::Drop).unwrap();
        assert_eq!(i2s.read(&mut buf), Err(Error::InvalidState));
    }

    #[test]
    fn test_config_access() {
        let (hal, _sim) = sim_hal();
        let mut i2s = I2s::open(&hal, 0).unwrap();
        assert_eq!(i2s.config_get(I2sDir::Rx), Ok(None));
        assert_eq!(i2s.config_get(I2sDir::Both), Err(Error::InvalidArgument));
        i2s.config_set(I2sDir::Rx, small()).unwrap();
        assert_eq!(i2s.config_get(I2sDir::Rx), Ok(Some(small())));
        i2s.trigger(I2sDir::Rx, I2sTrigger::Start).unwrap();
        assert_eq!(
            i2s.config_set(I2sDir::Rx, I2sConfig::default()),
            Err(Error::InvalidState)
        );
        let mut short = [0u8; 2];
        assert_eq!(i2s.read(&mut short), Err(Error::InvalidArgument));
    }
}
