//! Analog input
//!
//! ADC channels report a static resolution and reference voltage; raw
//! samples range over `0..=max_raw()`.

/// Static ADC properties reported by the device
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdcInfo {
    /// Sample width in bits (1..=16)
    pub resolution_bits: u8,
    /// Reference voltage in volts
    pub ref_voltage: f32,
}

impl Default for AdcInfo {
    fn default() -> Self {
        Self {
            resolution_bits: 12,
            ref_voltage: 3.3,
        }
    }
}

impl AdcInfo {
    /// Largest raw sample value
    pub const fn max_raw(&self) -> u16 {
        if self.resolution_bits >= 16 {
            u16::MAX
        } else {
            (1u16 << self.resolution_bits) - 1
        }
    }

    /// Convert a raw sample to volts
    pub fn to_voltage(&self, raw: u16) -> f32 {
        raw as f32 * self.ref_voltage / self.max_raw() as f32
    }

    /// Reject zero or oversized resolutions and non-positive references
    pub fn validate(&self) -> crate::Result<()> {
        if self.resolution_bits == 0 || self.resolution_bits > 16 {
            return Err(crate::Error::InvalidArgument);
        }
        if !(self.ref_voltage > 0.0) {
            return Err(crate::Error::InvalidArgument);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_raw() {
        let info = AdcInfo {
            resolution_bits: 12,
            ref_voltage: 3.3,
        };
        assert_eq!(info.max_raw(), 4095);
        let info16 = AdcInfo {
            resolution_bits: 16,
            ..info
        };
        assert_eq!(info16.max_raw(), u16::MAX);
    }

    #[test]
    fn test_to_voltage_full_scale() {
        let info = AdcInfo::default();
        let full = info.to_voltage(info.max_raw());
        assert!(full > 3.299 && full < 3.301);
        assert_eq!(info.to_voltage(0), 0.0);
    }

    #[test]
    fn test_validate() {
        assert!(AdcInfo::default().validate().is_ok());
        let bad = AdcInfo {
            resolution_bits: 0,
            ref_voltage: 3.3,
        };
        assert!(bad.validate().is_err());
        let nan = AdcInfo {
            resolution_bits: 10,
            ref_voltage: f32::NAN,
        };
        assert!(nan.validate().is_err());
    }
}
