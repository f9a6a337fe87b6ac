use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use boardio_hal::{DeviceId, Error, I2cSpeed, Result, SpiConfig};
use embedded_hal::i2c::Operation;
use log::trace;

use super::Channels;
use crate::driver::{I2cDriver, SpiDriver};

/// Device on a simulated I2C bus
pub trait I2cTarget: Send {
    fn write(&mut self, data: &[u8]) -> Result<()>;

    fn read(&mut self, buf: &mut [u8]) -> Result<()>;
}

/// Register-mapped I2C target
///
/// The first byte of a write selects the register; further bytes are
/// stored at consecutive registers. Reads start at the selected register.
/// Clones share the same registers.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    state: Arc<parking_lot::Mutex<([u8; 256], u8)>>,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            state: Arc::new(parking_lot::Mutex::new(([0; 256], 0))),
        }
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self, register: u8) -> u8 {
        self.state.lock().0[register as usize]
    }

    pub fn poke(&self, register: u8, value: u8) {
        self.state.lock().0[register as usize] = value;
    }
}

impl I2cTarget for RegisterFile {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        let (regs, pointer) = &mut *state;
        if let Some((&first, rest)) = data.split_first() {
            *pointer = first;
            for &byte in rest {
                regs[*pointer as usize] = byte;
                *pointer = pointer.wrapping_add(1);
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut state = self.state.lock();
        let (regs, pointer) = &mut *state;
        for byte in buf {
            *byte = regs[*pointer as usize];
            *pointer = pointer.wrapping_add(1);
        }
        Ok(())
    }
}

#[derive(Default)]
struct I2cBusState {
    speed: Option<I2cSpeed>,
    targets: BTreeMap<u8, Box<dyn I2cTarget>>,
}

impl I2cBusState {
    /// Target at `address`; an absent target does not acknowledge
    fn target(&mut self, address: u8) -> Result<&mut Box<dyn I2cTarget>> {
        self.targets.get_mut(&address).ok_or(Error::Io)
    }
}

/// Simulated I2C masters
pub struct SimI2c {
    buses: Channels<I2cBusState>,
}

impl SimI2c {
    pub fn new(count: usize) -> Self {
        Self {
            buses: Channels::new(count),
        }
    }

    /// Connect `target` at `address`; `Busy` if the address is taken
    pub fn attach(&self, bus: DeviceId, address: u8, target: impl I2cTarget + 'static) -> Result<()> {
        self.buses.with(bus, |b| {
            if b.targets.contains_key(&address) {
                return Err(Error::Busy);
            }
            b.targets.insert(address, Box::new(target));
            Ok(())
        })?
    }

    pub fn detach(&self, bus: DeviceId, address: u8) -> Result<()> {
        self.buses.with(bus, |b| {
            b.targets.remove(&address);
        })
    }

    /// Speed last configured on `bus`
    pub fn speed(&self, bus: DeviceId) -> Result<Option<I2cSpeed>> {
        self.buses.with(bus, |b| b.speed)
    }
}

impl I2cDriver for SimI2c {
    fn configure(&self, bus: DeviceId, speed: I2cSpeed) -> Result<()> {
        self.buses.with(bus, |b| b.speed = Some(speed))
    }

    fn write(&self, bus: DeviceId, address: u8, data: &[u8]) -> Result<()> {
        trace!("i2c{} write {:#04x}: {} bytes", bus, address, data.len());
        self.buses.with(bus, |b| b.target(address)?.write(data))?
    }

    fn read(&self, bus: DeviceId, address: u8, buf: &mut [u8]) -> Result<()> {
        trace!("i2c{} read {:#04x}: {} bytes", bus, address, buf.len());
        self.buses.with(bus, |b| b.target(address)?.read(buf))?
    }

    fn write_read(&self, bus: DeviceId, address: u8, data: &[u8], buf: &mut [u8]) -> Result<()> {
        self.buses.with(bus, |b| {
            let target = b.target(address)?;
            target.write(data)?;
            target.read(buf)
        })?
    }

    fn transaction(&self, bus: DeviceId, address: u8, operations: &mut [Operation<'_>]) -> Result<()> {
        trace!("i2c{} transaction {:#04x}: {} segments", bus, address, operations.len());
        self.buses.with(bus, |b| {
            let target = b.target(address)?;
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(data) => target.write(data)?,
                    Operation::Read(buf) => target.read(buf)?,
                }
            }
            Ok(())
        })?
    }
}

/// Device on a simulated SPI bus, exchanging one byte per clocked byte
pub trait SpiTarget: Send {
    fn exchange(&mut self, mosi: u8) -> u8;
}

impl<F: FnMut(u8) -> u8 + Send> SpiTarget for F {
    fn exchange(&mut self, mosi: u8) -> u8 {
        self(mosi)
    }
}

#[derive(Default)]
struct SpiBusState {
    config: Option<SpiConfig>,
    target: Option<Box<dyn SpiTarget>>,
    mosi: Vec<u8>,
    delay: Duration,
}

/// Simulated SPI masters
///
/// With no target attached, MISO is looped back from MOSI.
pub struct SimSpi {
    buses: Channels<SpiBusState>,
}

impl SimSpi {
    pub fn new(count: usize) -> Self {
        Self {
            buses: Channels::new(count),
        }
    }

    pub fn attach(&self, bus: DeviceId, target: impl SpiTarget + 'static) -> Result<()> {
        self.buses.with(bus, |b| b.target = Some(Box::new(target)))
    }

    pub fn detach(&self, bus: DeviceId) -> Result<()> {
        self.buses.with(bus, |b| b.target = None)
    }

    /// Bytes clocked out on MOSI since the last call
    pub fn take_mosi(&self, bus: DeviceId) -> Result<Vec<u8>> {
        self.buses.with(bus, |b| std::mem::take(&mut b.mosi))
    }

    /// Make every transfer on `bus` take at least `delay`
    pub fn set_transfer_delay(&self, bus: DeviceId, delay: Duration) -> Result<()> {
        self.buses.with(bus, |b| b.delay = delay)
    }

    pub fn config(&self, bus: DeviceId) -> Result<Option<SpiConfig>> {
        self.buses.with(bus, |b| b.config)
    }
}

impl SpiDriver for SimSpi {
    fn configure(&self, bus: DeviceId, config: &SpiConfig) -> Result<()> {
        self.buses.with(bus, |b| b.config = Some(*config))
    }

    fn transfer(&self, bus: DeviceId, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        if tx.len() != rx.len() {
            return Err(Error::InvalidArgument);
        }
        let delay = self.buses.with(bus, |b| b.delay)?;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        trace!("spi{} transfer: {} bytes", bus, tx.len());
        self.buses.with(bus, |b| {
            for (out, &mosi) in rx.iter_mut().zip(tx) {
                *out = match b.target.as_mut() {
                    Some(target) => target.exchange(mosi),
                    None => mosi,
                };
            }
            b.mosi.extend_from_slice(tx);
        })
    }
}
