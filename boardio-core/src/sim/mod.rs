//! Simulated board
//!
//! Host-side drivers for every peripheral class. Each exposes a test-side
//! API for the outside world (drive a pin, attach an I2C target, inject
//! UART bytes, pulse a counter input) and records what the controllers
//! did to the hardware.

mod analog;
mod bus;
mod counter;
mod gpio;
mod i2s;
mod uart;

use std::sync::Arc;

use boardio_hal::{DeviceId, Error, Result};

use crate::config::BoardConfig;
use crate::driver::Board;

pub use analog::{SimAdc, SimPwm};
pub use bus::{I2cTarget, RegisterFile, SimI2c, SimSpi, SpiTarget};
pub use counter::SimCounter;
pub use gpio::SimGpio;
pub use i2s::SimI2s;
pub use uart::SimUart;

/// Per-device state table, indexed by device id
#[derive(Debug)]
struct Channels<T> {
    slots: parking_lot::Mutex<Vec<T>>,
}

impl<T: Default> Channels<T> {
    fn new(count: usize) -> Self {
        Self {
            slots: parking_lot::Mutex::new((0..count).map(|_| T::default()).collect()),
        }
    }
}

impl<T> Channels<T> {
    fn with<R>(&self, id: DeviceId, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(id as usize).ok_or(Error::InvalidArgument)?;
        Ok(f(slot))
    }
}

/// Test-side handles to the simulated drivers of one board
#[derive(Clone)]
pub struct SimBoard {
    pub gpio: Arc<SimGpio>,
    pub i2c: Arc<SimI2c>,
    pub spi: Arc<SimSpi>,
    pub uart: Arc<SimUart>,
    pub adc: Arc<SimAdc>,
    pub pwm: Arc<SimPwm>,
    pub counter: Arc<SimCounter>,
    pub i2s: Arc<SimI2s>,
}

impl SimBoard {
    pub fn new(config: &BoardConfig) -> Self {
        let devices = &config.devices;
        Self {
            gpio: Arc::new(SimGpio::new(devices.gpio)),
            i2c: Arc::new(SimI2c::new(devices.i2c)),
            spi: Arc::new(SimSpi::new(devices.spi)),
            uart: Arc::new(SimUart::new(devices.uart)),
            adc: Arc::new(SimAdc::new(devices.adc, config.adc)),
            pwm: Arc::new(SimPwm::new(devices.pwm, config.pwm)),
            counter: Arc::new(SimCounter::new(devices.counter)),
            i2s: Arc::new(SimI2s::new(devices.i2s)),
        }
    }

    /// Driver bundle backed by these simulators
    pub fn board(&self) -> Board {
        Board {
            gpio: self.gpio.clone(),
            i2c: self.i2c.clone(),
            spi: self.spi.clone(),
            uart: self.uart.clone(),
            adc: self.adc.clone(),
            pwm: self.pwm.clone(),
            counter: self.counter.clone(),
            i2s: self.i2s.clone(),
        }
    }
}
