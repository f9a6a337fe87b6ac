//! Board configuration
//!
//! A board file describes how many devices of each class the board has,
//! the analog characteristics of its ADC and PWM channels, the counter
//! width and platform clock settings.
//!
//! # Example
//!
//! ```toml
//! name = "swiftio"
//!
//! [devices]
//! gpio = 46
//! uart = 4
//!
//! [adc]
//! resolution_bits = 12
//! ref_voltage = 3.3
//!
//! [platform]
//! clock = "manual"
//! ```
//!
//! Omitted sections fall back to [`BoardConfig::default`].

use std::path::Path;

use boardio_hal::adc::AdcInfo;
use boardio_hal::device::MAX_DEVICES_PER_CLASS;
use boardio_hal::pwm::PwmInfo;
use boardio_hal::DeviceClass;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::ClockKind;

/// Board configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read board file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid board file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize board config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("{class} count {count} exceeds the limit of {max}")]
    TooManyDevices {
        class: DeviceClass,
        count: usize,
        max: usize,
    },
    #[error("invalid {0} settings")]
    Invalid(&'static str),
}

/// Device counts per peripheral class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCounts {
    pub gpio: usize,
    pub i2c: usize,
    pub spi: usize,
    pub uart: usize,
    pub adc: usize,
    pub pwm: usize,
    pub timer: usize,
    pub counter: usize,
    pub i2s: usize,
}

impl Default for DeviceCounts {
    fn default() -> Self {
        Self {
            gpio: 46,
            i2c: 2,
            spi: 2,
            uart: 4,
            adc: 14,
            pwm: 14,
            timer: 8,
            counter: 4,
            i2s: 1,
        }
    }
}

impl DeviceCounts {
    pub fn get(&self, class: DeviceClass) -> usize {
        match class {
            DeviceClass::Gpio => self.gpio,
            DeviceClass::I2c => self.i2c,
            DeviceClass::Spi => self.spi,
            DeviceClass::Uart => self.uart,
            DeviceClass::Adc => self.adc,
            DeviceClass::Pwm => self.pwm,
            DeviceClass::Timer => self.timer,
            DeviceClass::Counter => self.counter,
            DeviceClass::I2s => self.i2s,
        }
    }

    /// Counts in [`DeviceClass::index`] order
    pub fn as_array(&self) -> [usize; DeviceClass::COUNT] {
        DeviceClass::ALL.map(|class| self.get(class))
    }
}

/// Counter hardware settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Largest count before wrapping to zero
    pub max_top_value: u32,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            max_top_value: u32::MAX,
        }
    }
}

/// Platform clock and entropy settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub clock: ClockKind,
    /// Hardware cycle counter frequency
    pub cycles_per_second: u32,
    /// Fixed seed for reproducible random output
    pub rng_seed: Option<u64>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            clock: ClockKind::Monotonic,
            cycles_per_second: 600_000_000,
            rng_seed: None,
        }
    }
}

/// Complete board description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub name: String,
    pub devices: DeviceCounts,
    pub adc: AdcInfo,
    pub pwm: PwmInfo,
    pub counter: CounterConfig,
    pub platform: PlatformConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "swiftio".into(),
            devices: DeviceCounts::default(),
            adc: AdcInfo::default(),
            pwm: PwmInfo::default(),
            counter: CounterConfig::default(),
            platform: PlatformConfig::default(),
        }
    }
}

impl BoardConfig {
    /// Default board on a manual clock with a fixed seed, for tests and
    /// deterministic simulation
    pub fn simulated() -> Self {
        Self {
            platform: PlatformConfig {
                clock: ClockKind::Manual,
                rng_seed: Some(0),
                ..PlatformConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for class in DeviceClass::ALL {
            let count = self.devices.get(class);
            if count > MAX_DEVICES_PER_CLASS {
                return Err(ConfigError::TooManyDevices {
                    class,
                    count,
                    max: MAX_DEVICES_PER_CLASS,
                });
            }
        }
        self.adc.validate().map_err(|_| ConfigError::Invalid("adc"))?;
        if self.pwm.min_frequency == 0 || self.pwm.min_frequency > self.pwm.max_frequency {
            return Err(ConfigError::Invalid("pwm"));
        }
        if self.counter.max_top_value == 0 {
            return Err(ConfigError::Invalid("counter"));
        }
        if self.platform.cycles_per_second == 0 {
            return Err(ConfigError::Invalid("platform"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BoardConfig::default().validate().is_ok());
        assert!(BoardConfig::simulated().validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = BoardConfig::from_toml_str(
            r#"
            name = "tiny"

            [devices]
            gpio = 4
            uart = 1

            [platform]
            clock = "manual"
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "tiny");
        assert_eq!(config.devices.gpio, 4);
        assert_eq!(config.devices.uart, 1);
        assert_eq!(config.devices.i2c, DeviceCounts::default().i2c);
        assert_eq!(config.platform.clock, ClockKind::Manual);
        assert_eq!(config.adc, AdcInfo::default());
    }

    #[test]
    fn test_too_many_devices() {
        let err = BoardConfig::from_toml_str("[devices]\ngpio = 65\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TooManyDevices {
                class: DeviceClass::Gpio,
                count: 65,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_sections() {
        let err = BoardConfig::from_toml_str("[adc]\nresolution_bits = 0\nref_voltage = 3.3\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("adc")));
        let err = BoardConfig::from_toml_str("[pwm]\nmin_frequency = 10\nmax_frequency = 5\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("pwm")));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            BoardConfig::from_toml_str("devices = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = BoardConfig::simulated();
        let text = config.to_toml_string().unwrap();
        assert_eq!(BoardConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_counts_in_class_order() {
        let counts = DeviceCounts::default().as_array();
        assert_eq!(counts[DeviceClass::Gpio.index()], 46);
        assert_eq!(counts[DeviceClass::I2s.index()], 1);
    }
}
