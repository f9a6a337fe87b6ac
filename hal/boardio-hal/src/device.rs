//! Peripheral classes and device ids
//!
//! Device ids are small integers namespaced per class. The number of
//! devices per class is a board property; see the registry in
//! `boardio-core`.

/// Maximum number of devices of any one class
pub const MAX_DEVICES_PER_CLASS: usize = 64;

/// Device id within a peripheral class
pub type DeviceId = u8;

/// Peripheral class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DeviceClass {
    Gpio = 0,
    I2c = 1,
    Spi = 2,
    Uart = 3,
    Adc = 4,
    Pwm = 5,
    Timer = 6,
    Counter = 7,
    I2s = 8,
}

impl DeviceClass {
    /// Number of peripheral classes
    pub const COUNT: usize = 9;

    /// All classes in table order
    pub const ALL: [DeviceClass; Self::COUNT] = [
        DeviceClass::Gpio,
        DeviceClass::I2c,
        DeviceClass::Spi,
        DeviceClass::Uart,
        DeviceClass::Adc,
        DeviceClass::Pwm,
        DeviceClass::Timer,
        DeviceClass::Counter,
        DeviceClass::I2s,
    ];

    /// Index into per-class tables
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short lowercase name, as used in board files and logs
    pub const fn name(self) -> &'static str {
        match self {
            DeviceClass::Gpio => "gpio",
            DeviceClass::I2c => "i2c",
            DeviceClass::Spi => "spi",
            DeviceClass::Uart => "uart",
            DeviceClass::Adc => "adc",
            DeviceClass::Pwm => "pwm",
            DeviceClass::Timer => "timer",
            DeviceClass::Counter => "counter",
            DeviceClass::I2s => "i2s",
        }
    }
}

impl core::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_table_order() {
        for (i, class) in DeviceClass::ALL.iter().enumerate() {
            assert_eq!(class.index(), i);
        }
    }
}
