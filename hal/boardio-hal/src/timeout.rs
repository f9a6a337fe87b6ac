//! Timeouts for blocking operations
//!
//! The C-style convention is a signed millisecond count where `0` polls
//! and any negative value waits forever. [`Timeout`] makes the three cases
//! explicit while still converting from and to that convention.

use core::time::Duration;

/// Wait forever (C-style sentinel)
pub const FOREVER_MS: i32 = -1;

/// Do not wait (C-style sentinel)
pub const NO_WAIT_MS: i32 = 0;

/// How long a blocking operation may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Timeout {
    /// Poll once and return immediately
    NoWait,
    /// Block until the awaited event happens
    #[default]
    Forever,
    /// Block for at most this many milliseconds
    Millis(u32),
}

impl Timeout {
    /// Convert from the signed millisecond convention
    pub const fn from_millis(ms: i32) -> Self {
        if ms == 0 {
            Timeout::NoWait
        } else if ms < 0 {
            Timeout::Forever
        } else {
            Timeout::Millis(ms as u32)
        }
    }

    /// Convert to the signed millisecond convention
    ///
    /// Bounded waits larger than `i32::MAX` are clamped.
    pub const fn as_millis(self) -> i32 {
        match self {
            Timeout::NoWait => NO_WAIT_MS,
            Timeout::Forever => FOREVER_MS,
            Timeout::Millis(0) => NO_WAIT_MS,
            Timeout::Millis(ms) if ms > i32::MAX as u32 => i32::MAX,
            Timeout::Millis(ms) => ms as i32,
        }
    }

    /// True if this timeout never blocks
    pub const fn is_no_wait(self) -> bool {
        matches!(self, Timeout::NoWait | Timeout::Millis(0))
    }

    /// Bounded wait duration, `None` for [`Timeout::Forever`]
    pub const fn duration(self) -> Option<Duration> {
        match self {
            Timeout::NoWait => Some(Duration::ZERO),
            Timeout::Forever => None,
            Timeout::Millis(ms) => Some(Duration::from_millis(ms as u64)),
        }
    }
}

impl From<i32> for Timeout {
    fn from(ms: i32) -> Self {
        Timeout::from_millis(ms)
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        let ms = d.as_millis();
        if ms == 0 {
            Timeout::NoWait
        } else {
            Timeout::Millis(ms.min(u32::MAX as u128) as u32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_convention() {
        assert_eq!(Timeout::from_millis(0), Timeout::NoWait);
        assert_eq!(Timeout::from_millis(-1), Timeout::Forever);
        assert_eq!(Timeout::from_millis(-500), Timeout::Forever);
        assert_eq!(Timeout::from_millis(250), Timeout::Millis(250));
    }

    #[test]
    fn test_back_to_signed() {
        assert_eq!(Timeout::NoWait.as_millis(), 0);
        assert_eq!(Timeout::Forever.as_millis(), -1);
        assert_eq!(Timeout::Millis(10).as_millis(), 10);
        assert_eq!(Timeout::Millis(u32::MAX).as_millis(), i32::MAX);
    }

    #[test]
    fn test_zero_millis_never_blocks() {
        assert!(Timeout::Millis(0).is_no_wait());
        assert!(Timeout::NoWait.is_no_wait());
        assert!(!Timeout::Forever.is_no_wait());
    }

    #[test]
    fn test_duration() {
        assert_eq!(Timeout::Forever.duration(), None);
        assert_eq!(Timeout::Millis(3).duration(), Some(Duration::from_millis(3)));
        assert_eq!(Timeout::from(Duration::from_micros(10)), Timeout::NoWait);
    }
}
