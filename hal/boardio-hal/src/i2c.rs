//! I2C bus abstractions
//!
//! Provides the bus speed presets and a trait for I2C master operations.

/// Highest 7-bit I2C address
pub const MAX_ADDRESS: u8 = 0x7F;

/// I2C bus master
///
/// Addresses are 7-bit. Empty buffers are a successful no-op.
pub trait I2cBus {
    /// Write data to a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `data` - Bytes to write
    fn write(&mut self, address: u8, data: &[u8]) -> crate::Result<()>;

    /// Read data from a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `buf` - Buffer to read into
    fn read(&mut self, address: u8, buf: &mut [u8]) -> crate::Result<()>;

    /// Write then read in a single transaction
    ///
    /// The bus is not released between the phases. This is commonly used
    /// to write a register address then read data.
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `write_data` - Bytes to write (typically register address)
    /// * `read_buf` - Buffer to read into
    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> crate::Result<()>;
}

/// I2C clock speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum I2cSpeed {
    /// Standard mode (100 kHz)
    #[default]
    Standard,
    /// Fast mode (400 kHz)
    Fast,
    /// Fast mode plus (1 MHz)
    FastPlus,
    /// Any other clock frequency in Hz
    Custom(u32),
}

impl I2cSpeed {
    /// Clock frequency in Hz
    pub const fn hz(self) -> u32 {
        match self {
            I2cSpeed::Standard => 100_000,
            I2cSpeed::Fast => 400_000,
            I2cSpeed::FastPlus => 1_000_000,
            I2cSpeed::Custom(hz) => hz,
        }
    }

    /// Map a raw frequency onto a preset where one matches
    pub const fn from_hz(hz: u32) -> Self {
        match hz {
            100_000 => I2cSpeed::Standard,
            400_000 => I2cSpeed::Fast,
            1_000_000 => I2cSpeed::FastPlus,
            other => I2cSpeed::Custom(other),
        }
    }

    /// Reject a zero clock
    pub const fn validate(self) -> crate::Result<()> {
        if self.hz() == 0 {
            Err(crate::Error::InvalidArgument)
        } else {
            Ok(())
        }
    }
}

/// Reject addresses outside the 7-bit range
pub const fn check_address(address: u8) -> crate::Result<()> {
    if address > MAX_ADDRESS {
        Err(crate::Error::InvalidArgument)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(I2cSpeed::Standard.hz(), 100_000);
        assert_eq!(I2cSpeed::Fast.hz(), 400_000);
        assert_eq!(I2cSpeed::FastPlus.hz(), 1_000_000);
        assert_eq!(I2cSpeed::from_hz(400_000), I2cSpeed::Fast);
        assert_eq!(I2cSpeed::from_hz(3_400_000), I2cSpeed::Custom(3_400_000));
    }

    #[test]
    fn test_validation() {
        assert!(I2cSpeed::Custom(0).validate().is_err());
        assert!(I2cSpeed::Custom(50_000).validate().is_ok());
        assert!(check_address(0x7F).is_ok());
        assert_eq!(check_address(0x80), Err(crate::Error::InvalidArgument));
    }
}
