//! Handle-based peripheral runtime
//!
//! This crate turns the boardio driver contract into exclusively owned
//! device handles:
//!
//! - Device registry with generation-checked leases
//! - Controllers for GPIO, I2C, SPI, UART, ADC, PWM, timers, counters, I2S
//! - OS primitives (tasks, message queues, mutexes, semaphores)
//! - Platform time, cycle counter and random source
//! - Board configuration loaded from TOML
//! - A simulated board for host testing
//!
//! ```no_run
//! use boardio_core::{BoardConfig, Hal};
//! use boardio_core::gpio::Gpio;
//! use boardio_hal::{Direction, Level, Pull};
//!
//! let (hal, _sim) = Hal::simulated(BoardConfig::simulated())?;
//! let mut led = Gpio::open_with(&hal, 13, Direction::Output, Pull::None)?;
//! led.write(Level::High)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

pub mod adc;
pub mod clock;
pub mod config;
pub mod context;
pub mod counter;
pub mod driver;
pub mod gpio;
pub mod i2c;
pub mod i2s;
pub mod irq;
pub mod os;
pub mod platform;
pub mod pwm;
pub mod registry;
pub mod sim;
pub mod spi;
pub mod timer;
pub mod uart;

pub use boardio_hal::{DeviceClass, DeviceId, Error, Result, Timeout};
pub use clock::{Clock, ClockKind};
pub use config::{BoardConfig, ConfigError};
pub use context::Hal;
pub use platform::{Delay, Platform};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::BoardConfig;
    use crate::context::Hal;
    use crate::sim::SimBoard;

    /// Simulated board on a manual clock, with test logging enabled
    pub fn sim_hal() -> (Hal, SimBoard) {
        let _ = env_logger::builder().is_test(true).try_init();
        Hal::simulated(BoardConfig::simulated()).expect("simulated board config is valid")
    }
}
