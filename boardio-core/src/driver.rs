//! Board driver traits
//!
//! Controllers own handles and validation; drivers own the hardware. A
//! driver is shared by every controller of its class and addressed by
//! device id, so all methods take `&self` and implementations serialize
//! access per device internally.
//!
//! Asynchronous events travel from driver to controller through sinks the
//! controller registers with `attach`. Drivers call sinks in interrupt
//! context (see [`crate::irq::isr`]) and never while holding their own
//! locks.

use std::sync::Arc;

use boardio_hal::adc::AdcInfo;
use boardio_hal::i2s::{I2sConfig, I2sDir, I2sTrigger};
use boardio_hal::pwm::{PwmInfo, PwmOutput};
use boardio_hal::{DeviceId, Direction, I2cSpeed, Level, Pull, Result, SpiConfig, UartConfig};
use embedded_hal::i2c::Operation;

/// Receiver of line level changes (GPIO pins, counter inputs)
pub trait EdgeSink: Send + Sync {
    /// The line moved from `from` to `to`
    ///
    /// Level-triggered consumers also see repeated levels (`from == to`).
    fn on_level(&self, from: Level, to: Level);
}

/// Receiver of incoming byte streams (UART, I2S)
pub trait ByteSink: Send + Sync {
    fn on_bytes(&self, data: &[u8]);

    /// Framing/parity error or overrun in the hardware
    fn on_fault(&self);
}

/// Digital pins
pub trait GpioDriver: Send + Sync {
    fn configure(&self, pin: DeviceId, direction: Direction, pull: Pull) -> Result<()>;

    fn set_level(&self, pin: DeviceId, level: Level) -> Result<()>;

    /// Level currently on the line
    fn level(&self, pin: DeviceId) -> Result<Level>;

    /// Route level changes on `pin` to `sink`
    fn attach(&self, pin: DeviceId, sink: Arc<dyn EdgeSink>) -> Result<()>;

    fn detach(&self, pin: DeviceId);
}

/// I2C masters
pub trait I2cDriver: Send + Sync {
    fn configure(&self, bus: DeviceId, speed: I2cSpeed) -> Result<()>;

    fn write(&self, bus: DeviceId, address: u8, data: &[u8]) -> Result<()>;

    fn read(&self, bus: DeviceId, address: u8, buf: &mut [u8]) -> Result<()>;

    /// Write then read with a repeated start, as one bus transaction
    fn write_read(&self, bus: DeviceId, address: u8, data: &[u8], buf: &mut [u8]) -> Result<()>;

    /// Run `operations` as one bus transaction
    ///
    /// Each operation is a segment after a (repeated) start; there is a
    /// single stop at the end. Callers merge adjacent operations of the
    /// same kind before handing them over.
    fn transaction(&self, bus: DeviceId, address: u8, operations: &mut [Operation<'_>]) -> Result<()>;
}

/// SPI masters
pub trait SpiDriver: Send + Sync {
    fn configure(&self, bus: DeviceId, config: &SpiConfig) -> Result<()>;

    /// Full-duplex transfer; `tx` and `rx` have equal length
    fn transfer(&self, bus: DeviceId, tx: &[u8], rx: &mut [u8]) -> Result<()>;
}

/// UART ports
pub trait UartDriver: Send + Sync {
    fn configure(&self, port: DeviceId, config: &UartConfig) -> Result<()>;

    fn transmit(&self, port: DeviceId, data: &[u8]) -> Result<()>;

    /// Route received bytes and line faults on `port` to `sink`
    fn attach(&self, port: DeviceId, sink: Arc<dyn ByteSink>) -> Result<()>;

    fn detach(&self, port: DeviceId);
}

/// Analog inputs
pub trait AdcDriver: Send + Sync {
    fn info(&self, channel: DeviceId) -> Result<AdcInfo>;

    /// One raw conversion
    fn sample(&self, channel: DeviceId) -> Result<u16>;
}

/// PWM outputs
pub trait PwmDriver: Send + Sync {
    fn info(&self, channel: DeviceId) -> Result<PwmInfo>;

    fn apply(&self, channel: DeviceId, output: PwmOutput) -> Result<()>;
}

/// Edge counter inputs
pub trait CounterDriver: Send + Sync {
    /// Route input edges on `channel` to `sink`
    fn attach(&self, channel: DeviceId, sink: Arc<dyn EdgeSink>) -> Result<()>;

    fn detach(&self, channel: DeviceId);
}

/// I2S interfaces
pub trait I2sDriver: Send + Sync {
    fn configure(&self, id: DeviceId, dir: I2sDir, config: &I2sConfig) -> Result<()>;

    /// Stream state change requested by the controller
    fn trigger(&self, _id: DeviceId, _dir: I2sDir, _cmd: I2sTrigger) -> Result<()> {
        Ok(())
    }

    /// Queue one transmit block
    fn transmit(&self, id: DeviceId, block: &[u8]) -> Result<()>;

    /// Route received samples and overruns on `id` to `sink`
    fn attach_rx(&self, id: DeviceId, sink: Arc<dyn ByteSink>) -> Result<()>;

    fn detach_rx(&self, id: DeviceId);
}

/// The drivers making up one board
#[derive(Clone)]
pub struct Board {
    pub gpio: Arc<dyn GpioDriver>,
    pub i2c: Arc<dyn I2cDriver>,
    pub spi: Arc<dyn SpiDriver>,
    pub uart: Arc<dyn UartDriver>,
    pub adc: Arc<dyn AdcDriver>,
    pub pwm: Arc<dyn PwmDriver>,
    pub counter: Arc<dyn CounterDriver>,
    pub i2s: Arc<dyn I2sDriver>,
}
