//! Pulse-width modulation
//!
//! A [`PwmSetting`] is an absolute period/pulse pair in nanoseconds. It can
//! also be derived from a frequency and duty cycle. Construction enforces
//! `0 < period` and `pulse <= period`.

use crate::{Error, Result};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Device frequency bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PwmInfo {
    /// Lowest supported output frequency in Hz
    pub min_frequency: u32,
    /// Highest supported output frequency in Hz
    pub max_frequency: u32,
}

impl Default for PwmInfo {
    fn default() -> Self {
        Self {
            min_frequency: 1,
            max_frequency: 10_000_000,
        }
    }
}

impl PwmInfo {
    /// Check that `hz` lies within the device bounds
    pub const fn check_frequency(&self, hz: u32) -> Result<()> {
        if hz == 0 || hz < self.min_frequency || hz > self.max_frequency {
            Err(Error::InvalidArgument)
        } else {
            Ok(())
        }
    }
}

/// Period and pulse width in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PwmSetting {
    period_ns: u32,
    pulse_ns: u32,
}

impl PwmSetting {
    /// Absolute setting
    pub const fn new(period_ns: u32, pulse_ns: u32) -> Result<Self> {
        if period_ns == 0 || pulse_ns > period_ns {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            period_ns,
            pulse_ns,
        })
    }

    /// Setting derived from a frequency and a duty cycle in `0.0..=1.0`
    pub fn from_frequency(hz: u32, duty: f32) -> Result<Self> {
        if hz == 0 {
            return Err(Error::InvalidArgument);
        }
        let period = NANOS_PER_SECOND / hz as u64;
        if period == 0 || period > u32::MAX as u64 {
            return Err(Error::InvalidArgument);
        }
        Self::new(period as u32, 0)?.with_duty(duty)
    }

    /// Same period, new duty cycle
    pub fn with_duty(self, duty: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&duty) {
            return Err(Error::InvalidArgument);
        }
        let pulse = (self.period_ns as f64 * duty as f64 + 0.5) as u64;
        Self::new(self.period_ns, pulse.min(self.period_ns as u64) as u32)
    }

    pub const fn period_ns(&self) -> u32 {
        self.period_ns
    }

    pub const fn pulse_ns(&self) -> u32 {
        self.pulse_ns
    }

    /// Output frequency in Hz (rounded down)
    pub const fn frequency(&self) -> u32 {
        (NANOS_PER_SECOND / self.period_ns as u64) as u32
    }

    /// Fraction of the period the output is high
    pub fn duty_cycle(&self) -> f32 {
        self.pulse_ns as f32 / self.period_ns as f32
    }

    /// What the pin does with this setting applied
    pub const fn output(&self) -> PwmOutput {
        if self.pulse_ns == 0 {
            PwmOutput::Low
        } else if self.pulse_ns == self.period_ns {
            PwmOutput::High
        } else {
            PwmOutput::Toggling(*self)
        }
    }
}

/// Observable state of a PWM output pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmOutput {
    /// Output disabled (suspended or never configured)
    Off,
    /// Holds low (pulse == 0)
    Low,
    /// Holds high (pulse == period)
    High,
    /// Square wave
    Toggling(PwmSetting),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pulse_longer_than_period_rejected() {
        assert_eq!(PwmSetting::new(1000, 1001), Err(Error::InvalidArgument));
        assert_eq!(PwmSetting::new(0, 0), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_extremes_hold_level() {
        assert_eq!(PwmSetting::new(1000, 0).unwrap().output(), PwmOutput::Low);
        assert_eq!(PwmSetting::new(1000, 1000).unwrap().output(), PwmOutput::High);
        let half = PwmSetting::new(1000, 500).unwrap();
        assert_eq!(half.output(), PwmOutput::Toggling(half));
    }

    #[test]
    fn test_from_frequency() {
        let s = PwmSetting::from_frequency(1_000, 0.25).unwrap();
        assert_eq!(s.period_ns(), 1_000_000);
        assert_eq!(s.pulse_ns(), 250_000);
        assert_eq!(s.frequency(), 1_000);
        assert!(PwmSetting::from_frequency(1_000, 1.5).is_err());
        assert!(PwmSetting::from_frequency(1_000, f32::NAN).is_err());
    }

    #[test]
    fn test_info_bounds() {
        let info = PwmInfo {
            min_frequency: 10,
            max_frequency: 1_000,
        };
        assert!(info.check_frequency(10).is_ok());
        assert!(info.check_frequency(1_000).is_ok());
        assert!(info.check_frequency(9).is_err());
        assert!(info.check_frequency(1_001).is_err());
    }

    proptest! {
        #[test]
        fn prop_setting_never_exceeds_period(period in 1u32.., pulse in 0u32..) {
            match PwmSetting::new(period, pulse) {
                Ok(s) => prop_assert!(s.pulse_ns() <= s.period_ns()),
                Err(e) => {
                    prop_assert_eq!(e, Error::InvalidArgument);
                    prop_assert!(pulse > period);
                }
            }
        }

        #[test]
        fn prop_duty_keeps_period(period in 1u32..10_000_000, duty in 0.0f32..=1.0) {
            let s = PwmSetting::new(period, 0).unwrap().with_duty(duty).unwrap();
            prop_assert_eq!(s.period_ns(), period);
            prop_assert!(s.pulse_ns() <= period);
        }
    }
}
