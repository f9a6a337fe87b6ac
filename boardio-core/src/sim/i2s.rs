use std::sync::Arc;

use boardio_hal::i2s::{I2sConfig, I2sDir, I2sTrigger};
use boardio_hal::{DeviceId, Result};
use log::{debug, trace};

use super::Channels;
use crate::driver::{ByteSink, I2sDriver};
use crate::irq;

#[derive(Default)]
struct Interface {
    rx_config: Option<I2sConfig>,
    tx_config: Option<I2sConfig>,
    loopback: bool,
    tx: Vec<u8>,
    triggers: Vec<(I2sDir, I2sTrigger)>,
    sink: Option<Arc<dyn ByteSink>>,
}

/// Simulated I2S interfaces
///
/// Transmitted samples are recorded and, with loopback enabled, fed to
/// the receive side.
pub struct SimI2s {
    interfaces: Channels<Interface>,
}

impl SimI2s {
    pub fn new(count: usize) -> Self {
        Self {
            interfaces: Channels::new(count),
        }
    }

    pub fn set_loopback(&self, id: DeviceId, enabled: bool) -> Result<()> {
        self.interfaces.with(id, |i| i.loopback = enabled)
    }

    /// Deliver samples to the receive side
    pub fn inject(&self, id: DeviceId, data: &[u8]) -> Result<()> {
        let sink = self.interfaces.with(id, |i| i.sink.clone())?;
        if let Some(sink) = sink {
            irq::isr(|| sink.on_bytes(data));
        }
        Ok(())
    }

    /// Signal a receive overrun
    pub fn inject_fault(&self, id: DeviceId) -> Result<()> {
        let sink = self.interfaces.with(id, |i| i.sink.clone())?;
        debug!("i2s{} overrun", id);
        if let Some(sink) = sink {
            irq::isr(|| sink.on_fault());
        }
        Ok(())
    }

    /// Samples transmitted since the last call
    pub fn take_tx(&self, id: DeviceId) -> Result<Vec<u8>> {
        self.interfaces.with(id, |i| std::mem::take(&mut i.tx))
    }

    /// Trigger commands received, oldest first
    pub fn triggers(&self, id: DeviceId) -> Result<Vec<(I2sDir, I2sTrigger)>> {
        self.interfaces.with(id, |i| i.triggers.clone())
    }

    pub fn config(&self, id: DeviceId, dir: I2sDir) -> Result<Option<I2sConfig>> {
        self.interfaces.with(id, |i| match dir {
            I2sDir::Tx => i.tx_config,
            _ => i.rx_config,
        })
    }
}

impl I2sDriver for SimI2s {
    fn configure(&self, id: DeviceId, dir: I2sDir, config: &I2sConfig) -> Result<()> {
        self.interfaces.with(id, |i| {
            if dir.includes_rx() {
                i.rx_config = Some(*config);
            }
            if dir.includes_tx() {
                i.tx_config = Some(*config);
            }
        })
    }

    fn trigger(&self, id: DeviceId, dir: I2sDir, cmd: I2sTrigger) -> Result<()> {
        self.interfaces.with(id, |i| i.triggers.push((dir, cmd)))
    }

    fn transmit(&self, id: DeviceId, block: &[u8]) -> Result<()> {
        trace!("i2s{} tx: {} bytes", id, block.len());
        let echo = self.interfaces.with(id, |i| {
            i.tx.extend_from_slice(block);
            if i.loopback {
                i.sink.clone()
            } else {
                None
            }
        })?;
        if let Some(sink) = echo {
            irq::isr(|| sink.on_bytes(block));
        }
        Ok(())
    }

    fn attach_rx(&self, id: DeviceId, sink: Arc<dyn ByteSink>) -> Result<()> {
        self.interfaces.with(id, |i| i.sink = Some(sink))
    }

    fn detach_rx(&self, id: DeviceId) {
        // Out-of-range interfaces have nothing attached
        let _ = self.interfaces.with(id, |i| {
            i.sink = None;
            i.loopback = false;
        });
    }
}
