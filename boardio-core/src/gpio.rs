//! GPIO controller
//!
//! A pin starts unconfigured; `configure` fixes its direction and pull.
//! Interrupts need a trigger mode, an installed callback and the enable
//! flag; the three are set independently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use boardio_hal::{
    DeviceClass, DeviceId, DigitalInput, DigitalOutput, Direction, Error, InterruptMode, Level,
    Pull, Result,
};
use log::debug;

use crate::context::Hal;
use crate::driver::{EdgeSink, GpioDriver};
use crate::irq::{Callback, CallbackSlot};
use crate::registry::{HandleId, Lease};

#[derive(Default)]
struct PinIrq {
    mode: spin::Mutex<Option<InterruptMode>>,
    enabled: AtomicBool,
    callback: CallbackSlot<Callback>,
}

impl EdgeSink for PinIrq {
    fn on_level(&self, from: Level, to: Level) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        let Some(mode) = *self.mode.lock() else {
            return;
        };
        if !mode.fires(from, to) {
            return;
        }
        if let Some(callback) = self.callback.get() {
            callback();
        }
    }
}

/// Handle to one digital pin
pub struct Gpio {
    lease: Lease,
    driver: Arc<dyn GpioDriver>,
    config: Option<(Direction, Pull)>,
    output: Level,
    irq: Arc<PinIrq>,
}

impl Gpio {
    /// Open pin `id`, unconfigured
    pub fn open(hal: &Hal, id: DeviceId) -> Result<Self> {
        let lease = hal.registry().open(DeviceClass::Gpio, id)?;
        let driver = Arc::clone(&hal.board().gpio);
        let irq = Arc::new(PinIrq::default());
        driver.attach(id, irq.clone())?;
        Ok(Self {
            lease,
            driver,
            config: None,
            output: Level::Low,
            irq,
        })
    }

    /// Open pin `id` and configure it in one step
    pub fn open_with(hal: &Hal, id: DeviceId, direction: Direction, pull: Pull) -> Result<Self> {
        let mut pin = Self::open(hal, id)?;
        pin.configure(direction, pull)?;
        Ok(pin)
    }

    pub fn id(&self) -> DeviceId {
        self.lease.id()
    }

    /// Registry session backing this handle
    pub fn handle(&self) -> HandleId {
        self.lease.handle()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.config.map(|(direction, _)| direction)
    }

    pub fn pull(&self) -> Option<Pull> {
        self.config.map(|(_, pull)| pull)
    }

    pub fn configure(&mut self, direction: Direction, pull: Pull) -> Result<()> {
        self.lease.check()?;
        self.driver.configure(self.id(), direction, pull)?;
        self.config = Some((direction, pull));
        debug!("gpio{} configured: {:?} {:?}", self.id(), direction, pull);
        Ok(())
    }

    /// Drive an output pin
    pub fn write(&mut self, level: Level) -> Result<()> {
        self.lease.check()?;
        match self.config {
            None => Err(Error::InvalidState),
            Some((Direction::Input, _)) => Err(Error::InvalidOperation),
            Some((Direction::Output, _)) => {
                self.driver.set_level(self.id(), level)?;
                self.output = level;
                Ok(())
            }
        }
    }

    /// Level on the line, for either direction
    pub fn read(&self) -> Result<Level> {
        self.lease.check()?;
        if self.config.is_none() {
            return Err(Error::InvalidState);
        }
        self.driver.level(self.id())
    }

    /// Invert the level last written
    pub fn toggle(&mut self) -> Result<()> {
        let level = self.output.inverted();
        self.write(level)
    }

    /// Select the trigger; replaces any previous mode
    pub fn interrupt_configure(&mut self, mode: InterruptMode) -> Result<()> {
        self.lease.check()?;
        *self.irq.mode.lock() = Some(mode);
        Ok(())
    }

    pub fn interrupt_mode(&self) -> Option<InterruptMode> {
        *self.irq.mode.lock()
    }

    /// Install the interrupt callback; `Busy` if one is installed
    pub fn callback_install(&mut self, callback: impl Fn() + Send + Sync + 'static) -> Result<()> {
        self.lease.check()?;
        self.irq.callback.install(Arc::new(callback))
    }

    pub fn callback_uninstall(&mut self) -> Result<()> {
        self.lease.check()?;
        self.irq.callback.uninstall();
        Ok(())
    }

    /// Start delivering interrupts; `InvalidState` without a trigger mode
    pub fn interrupt_enable(&mut self) -> Result<()> {
        self.lease.check()?;
        if self.irq.mode.lock().is_none() {
            return Err(Error::InvalidState);
        }
        self.irq.enabled.store(true, Ordering::Release);
        Ok(())
    }

    pub fn interrupt_disable(&mut self) -> Result<()> {
        self.lease.check()?;
        self.irq.enabled.store(false, Ordering::Release);
        Ok(())
    }

    pub fn is_interrupt_enabled(&self) -> bool {
        self.irq.enabled.load(Ordering::Acquire)
    }

    pub fn close(mut self) -> Result<()> {
        self.teardown();
        self.lease.close()
    }

    fn teardown(&mut self) {
        self.irq.enabled.store(false, Ordering::Release);
        self.irq.callback.uninstall();
        // A stale handle must not detach the pin's current owner
        if self.lease.check().is_ok() {
            self.driver.detach(self.id());
        }
    }
}

impl Drop for Gpio {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl DigitalOutput for Gpio {
    fn set_level(&mut self, level: Level) -> Result<()> {
        self.write(level)
    }
}

impl DigitalInput for Gpio {
    fn level(&self) -> Result<Level> {
        self.read()
    }
}

impl embedded_hal::digital::ErrorType for Gpio {
    type Error = Error;
}

impl embedded_hal::digital::OutputPin for Gpio {
    fn set_low(&mut self) -> Result<()> {
        self.write(Level::Low)
    }

    fn set_high(&mut self) -> Result<()> {
        self.write(Level::High)
    }
}

impl embedded_hal::digital::StatefulOutputPin for Gpio {
    fn is_set_high(&mut self) -> Result<bool> {
        self.lease.check()?;
        Ok(self.output.is_high())
    }

    fn is_set_low(&mut self) -> Result<bool> {
        self.lease.check()?;
        Ok(!self.output.is_high())
    }
}

impl embedded_hal::digital::InputPin for Gpio {
    fn is_high(&mut self) -> Result<bool> {
        Ok(self.read()?.is_high())
    }

    fn is_low(&mut self) -> Result<bool> {
        Ok(!self.read()?.is_high())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irq::IsrChannel;
    use crate::test_support::sim_hal;
    use boardio_hal::Timeout;

    #[test]
    fn test_requires_configuration() {
        let (hal, _sim) = sim_hal();
        let mut pin = Gpio::open(&hal, 3).unwrap();
        assert_eq!(pin.write(Level::High), Err(Error::InvalidState));
        assert_eq!(pin.read(), Err(Error::InvalidState));
        pin.configure(Direction::Input, Pull::Down).unwrap();
        assert_eq!(pin.write(Level::High), Err(Error::InvalidOperation));
        assert_eq!(pin.read(), Ok(Level::Low));
    }

    #[test]
    fn test_output_reads_back() {
        let (hal, sim) = sim_hal();
        let mut pin = Gpio::open_with(&hal, 0, Direction::Output, Pull::None).unwrap();
        pin.write(Level::High).unwrap();
        assert_eq!(pin.read(), Ok(Level::High));
        assert_eq!(sim.gpio.line(0), Ok(Level::High));
        pin.toggle().unwrap();
        assert_eq!(sim.gpio.line(0), Ok(Level::Low));
    }

    #[test]
    fn test_double_open_busy() {
        let (hal, _sim) = sim_hal();
        let _pin = Gpio::open(&hal, 1).unwrap();
        assert_eq!(Gpio::open(&hal, 1).err(), Some(Error::Busy));
        assert_eq!(Gpio::open(&hal, 200).err(), Some(Error::InvalidArgument));
    }

    #[test]
    fn test_rising_edge_callback() {
        let (hal, sim) = sim_hal();
        let mut pin = Gpio::open_with(&hal, 5, Direction::Input, Pull::Down).unwrap();
        let events = Arc::new(IsrChannel::new(8).unwrap());
        let tx = Arc::clone(&events);
        pin.interrupt_configure(InterruptMode::RisingEdge).unwrap();
        pin.callback_install(move || {
            let _ = tx.post(());
        })
        .unwrap();
        pin.interrupt_enable().unwrap();
        sim.gpio.drive(5, Level::High).unwrap();
        sim.gpio.drive(5, Level::Low).unwrap();
        sim.gpio.drive(5, Level::High).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events.recv(Timeout::NoWait), Ok(()));
    }

    #[test]
    fn test_enable_without_mode() {
        let (hal, _sim) = sim_hal();
        let mut pin = Gpio::open_with(&hal, 2, Direction::Input, Pull::None).unwrap();
        assert_eq!(pin.interrupt_enable(), Err(Error::InvalidState));
    }

    #[test]
    fn test_second_callback_busy() {
        let (hal, _sim) = sim_hal();
        let mut pin = Gpio::open(&hal, 4).unwrap();
        pin.callback_install(|| {}).unwrap();
        assert_eq!(pin.callback_install(|| {}), Err(Error::Busy));
        pin.callback_uninstall().unwrap();
        pin.callback_install(|| {}).unwrap();
    }

    #[test]
    fn test_embedded_hal_traits() {
        use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};
        let (hal, _sim) = sim_hal();
        let mut pin = Gpio::open_with(&hal, 7, Direction::Output, Pull::None).unwrap();
        OutputPin::set_high(&mut pin).unwrap();
        assert!(StatefulOutputPin::is_set_high(&mut pin).unwrap());
        assert!(InputPin::is_high(&mut pin).unwrap());
    }
}
