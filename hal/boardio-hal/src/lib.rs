//! boardio Hardware Abstraction Layer
//!
//! This crate defines the value types, error codes and per-class traits
//! shared by every implementation of the boardio peripheral contract. It is
//! `no_std` so the same records can be exchanged with bare-metal drivers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application / language runtime binding │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  boardio-core (registry, controllers)   │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ boardio-hal   │       │ board drivers │
//! │ (this crate)  │       │  (sim, chip)  │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Modules
//!
//! - [`error`] - Error taxonomy and errno mapping
//! - [`timeout`] - Blocking/non-blocking timeout values
//! - [`device`] - Peripheral classes and device ids
//! - [`gpio`], [`i2c`], [`spi`], [`uart`] - Digital I/O and buses
//! - [`adc`], [`pwm`] - Analog input and pulse-width output
//! - [`timer`], [`counter`] - Software timers and edge counters
//! - [`i2s`] - Audio serial interface configuration and state machine

#![no_std]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod adc;
pub mod counter;
pub mod device;
pub mod error;
pub mod gpio;
pub mod i2c;
pub mod i2s;
pub mod pwm;
pub mod spi;
pub mod timeout;
pub mod timer;
pub mod uart;

// Re-export key types at crate root for convenience
pub use device::{DeviceClass, DeviceId};
pub use error::{status_code, Error, Result};
pub use gpio::{DigitalInput, DigitalOutput, Direction, InterruptMode, Level, Pull};
pub use i2c::{I2cBus, I2cSpeed};
pub use spi::{SpiBus, SpiConfig};
pub use timeout::Timeout;
pub use uart::{UartConfig, UartRx, UartTx};
