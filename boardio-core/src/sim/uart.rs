use std::sync::Arc;

use boardio_hal::{DeviceId, Result, UartConfig};
use log::{debug, trace};

use super::Channels;
use crate::driver::{ByteSink, UartDriver};
use crate::irq;

#[derive(Default)]
struct Port {
    config: Option<UartConfig>,
    loopback: bool,
    tx: Vec<u8>,
    sink: Option<Arc<dyn ByteSink>>,
}

/// Simulated UART ports
///
/// Transmitted bytes are recorded, and also fed back to the receiver when
/// loopback is enabled. Bytes and line faults from the far end are
/// injected with [`SimUart::inject`] and [`SimUart::inject_fault`].
pub struct SimUart {
    ports: Channels<Port>,
}

impl SimUart {
    pub fn new(count: usize) -> Self {
        Self {
            ports: Channels::new(count),
        }
    }

    pub fn set_loopback(&self, port: DeviceId, enabled: bool) -> Result<()> {
        self.ports.with(port, |p| p.loopback = enabled)
    }

    /// Deliver `data` to the port's receiver as if it arrived on RX
    ///
    /// Bytes arriving while no controller is attached are lost.
    pub fn inject(&self, port: DeviceId, data: &[u8]) -> Result<()> {
        let sink = self.ports.with(port, |p| p.sink.clone())?;
        trace!("uart{} rx: {} bytes", port, data.len());
        if let Some(sink) = sink {
            irq::isr(|| sink.on_bytes(data));
        }
        Ok(())
    }

    /// Signal a framing error on RX
    pub fn inject_fault(&self, port: DeviceId) -> Result<()> {
        let sink = self.ports.with(port, |p| p.sink.clone())?;
        debug!("uart{} line fault", port);
        if let Some(sink) = sink {
            irq::isr(|| sink.on_fault());
        }
        Ok(())
    }

    /// Bytes transmitted since the last call
    pub fn take_tx(&self, port: DeviceId) -> Result<Vec<u8>> {
        self.ports.with(port, |p| std::mem::take(&mut p.tx))
    }

    pub fn config(&self, port: DeviceId) -> Result<Option<UartConfig>> {
        self.ports.with(port, |p| p.config)
    }
}

impl UartDriver for SimUart {
    fn configure(&self, port: DeviceId, config: &UartConfig) -> Result<()> {
        self.ports.with(port, |p| p.config = Some(*config))
    }

    fn transmit(&self, port: DeviceId, data: &[u8]) -> Result<()> {
        let echo = self.ports.with(port, |p| {
            p.tx.extend_from_slice(data);
            if p.loopback {
                p.sink.clone()
            } else {
                None
            }
        })?;
        if let Some(sink) = echo {
            irq::isr(|| sink.on_bytes(data));
        }
        Ok(())
    }

    fn attach(&self, port: DeviceId, sink: Arc<dyn ByteSink>) -> Result<()> {
        self.ports.with(port, |p| p.sink = Some(sink))
    }

    fn detach(&self, port: DeviceId) {
        // Out-of-range ports have nothing attached
        let _ = self.ports.with(port, |p| {
            p.sink = None;
            p.loopback = false;
        });
    }
}
