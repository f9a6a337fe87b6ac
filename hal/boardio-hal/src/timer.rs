//! Software timers
//!
//! A timer is either idle or armed with a [`TimerMode`] and a period in
//! milliseconds. Expiries accumulate in a status counter that is read and
//! cleared in one step.

/// Timer trigger type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimerMode {
    /// Fire once, then return to idle
    OneShot,
    /// Re-arm automatically after each expiry
    Periodic,
}

/// Reject a zero period
pub const fn check_period(period_ms: u32) -> crate::Result<()> {
    if period_ms == 0 {
        Err(crate::Error::InvalidArgument)
    } else {
        Ok(())
    }
}
