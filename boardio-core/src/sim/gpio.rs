use std::sync::Arc;

use boardio_hal::{DeviceId, Direction, Level, Pull, Result};
use log::trace;

use super::Channels;
use crate::driver::{EdgeSink, GpioDriver};
use crate::irq;

#[derive(Default)]
struct Pin {
    direction: Option<Direction>,
    pull: Pull,
    output: Level,
    external: Option<Level>,
    sink: Option<Arc<dyn EdgeSink>>,
}

impl Pin {
    /// Level seen on the line
    fn line(&self) -> Level {
        match self.direction {
            Some(Direction::Output) if self.pull == Pull::OpenDrain && self.output.is_high() => {
                self.external.unwrap_or(Level::High)
            }
            Some(Direction::Output) => self.output,
            _ => self.external.unwrap_or(match self.pull {
                Pull::Up => Level::High,
                _ => Level::Low,
            }),
        }
    }
}

/// Simulated digital pins
///
/// Output pins drive the line unless configured open-drain, where a high
/// output releases the line to whatever is driven externally. Input pins
/// read the external level or fall back to their pull.
pub struct SimGpio {
    pins: Channels<Pin>,
}

impl SimGpio {
    pub fn new(count: usize) -> Self {
        Self {
            pins: Channels::new(count),
        }
    }

    /// Change a pin's line level by applying or removing an external driver
    ///
    /// Every call is reported to the pin's sink, even when the level does
    /// not change.
    fn update(&self, pin: DeviceId, f: impl FnOnce(&mut Pin)) -> Result<()> {
        let (from, to, sink) = self.pins.with(pin, |p| {
            let from = p.line();
            f(p);
            (from, p.line(), p.sink.clone())
        })?;
        trace!("gpio{}: {:?} -> {:?}", pin, from, to);
        if let Some(sink) = sink {
            irq::isr(|| sink.on_level(from, to));
        }
        Ok(())
    }

    /// Drive the line from outside the chip
    pub fn drive(&self, pin: DeviceId, level: Level) -> Result<()> {
        self.update(pin, |p| p.external = Some(level))
    }

    /// Stop driving the line from outside
    pub fn release(&self, pin: DeviceId) -> Result<()> {
        self.update(pin, |p| p.external = None)
    }

    /// Current line level
    pub fn line(&self, pin: DeviceId) -> Result<Level> {
        self.pins.with(pin, |p| p.line())
    }

    pub fn direction(&self, pin: DeviceId) -> Result<Option<Direction>> {
        self.pins.with(pin, |p| p.direction)
    }
}

impl GpioDriver for SimGpio {
    fn configure(&self, pin: DeviceId, direction: Direction, pull: Pull) -> Result<()> {
        self.pins.with(pin, |p| {
            p.direction = Some(direction);
            p.pull = pull;
        })
    }

    fn set_level(&self, pin: DeviceId, level: Level) -> Result<()> {
        self.update(pin, |p| p.output = level)
    }

    fn level(&self, pin: DeviceId) -> Result<Level> {
        self.line(pin)
    }

    fn attach(&self, pin: DeviceId, sink: Arc<dyn EdgeSink>) -> Result<()> {
        self.pins.with(pin, |p| p.sink = Some(sink))
    }

    fn detach(&self, pin: DeviceId) {
        // Out-of-range pins have nothing attached
        let _ = self.pins.with(pin, |p| {
            p.sink = None;
            p.direction = None;
            p.pull = Pull::None;
            p.output = Level::Low;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_drives_line() {
        let gpio = SimGpio::new(2);
        gpio.configure(0, Direction::Output, Pull::None).unwrap();
        gpio.set_level(0, Level::High).unwrap();
        assert_eq!(gpio.line(0), Ok(Level::High));
    }

    #[test]
    fn test_input_pull_defaults() {
        let gpio = SimGpio::new(2);
        gpio.configure(1, Direction::Input, Pull::Up).unwrap();
        assert_eq!(gpio.line(1), Ok(Level::High));
        gpio.drive(1, Level::Low).unwrap();
        assert_eq!(gpio.line(1), Ok(Level::Low));
        gpio.release(1).unwrap();
        assert_eq!(gpio.line(1), Ok(Level::High));
    }

    #[test]
    fn test_open_drain_wired_and() {
        let gpio = SimGpio::new(1);
        gpio.configure(0, Direction::Output, Pull::OpenDrain).unwrap();
        gpio.set_level(0, Level::High).unwrap();
        assert_eq!(gpio.line(0), Ok(Level::High));
        gpio.drive(0, Level::Low).unwrap();
        assert_eq!(gpio.line(0), Ok(Level::Low));
    }

    #[test]
    fn test_out_of_range() {
        let gpio = SimGpio::new(1);
        assert!(gpio.drive(5, Level::High).is_err());
    }
}
