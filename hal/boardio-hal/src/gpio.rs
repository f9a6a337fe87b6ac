//! GPIO pin abstractions
//!
//! Pin configuration values plus traits for digital input and output that
//! handle-based pin controllers implement.

/// Logic level on a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    /// True for [`Level::High`]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    /// The opposite level
    pub const fn inverted(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Output,
    Input,
}

/// Pin electrical mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Pull {
    /// Internal pull-up
    Up,
    /// Internal pull-down
    Down,
    /// Floating
    #[default]
    None,
    /// Output only drives low; high releases the line
    OpenDrain,
}

/// Interrupt trigger
///
/// Exactly one trigger is active per pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterruptMode {
    RisingEdge,
    FallingEdge,
    BothEdge,
    HighLevel,
    LowLevel,
}

impl InterruptMode {
    /// Whether a line change from `from` to `to` raises this trigger
    ///
    /// Level triggers fire whenever the line settles at their level,
    /// including repeated writes of the same level.
    pub const fn fires(self, from: Level, to: Level) -> bool {
        match self {
            InterruptMode::RisingEdge => matches!((from, to), (Level::Low, Level::High)),
            InterruptMode::FallingEdge => matches!((from, to), (Level::High, Level::Low)),
            InterruptMode::BothEdge => !matches!(
                (from, to),
                (Level::Low, Level::Low) | (Level::High, Level::High)
            ),
            InterruptMode::HighLevel => matches!(to, Level::High),
            InterruptMode::LowLevel => matches!(to, Level::Low),
        }
    }
}

/// Digital output pin
pub trait DigitalOutput {
    /// Drive the pin to `level`
    fn set_level(&mut self, level: Level) -> crate::Result<()>;

    /// Set the pin high (logic 1)
    fn set_high(&mut self) -> crate::Result<()> {
        self.set_level(Level::High)
    }

    /// Set the pin low (logic 0)
    fn set_low(&mut self) -> crate::Result<()> {
        self.set_level(Level::Low)
    }
}

/// Digital input pin
///
/// Output pins can be read too; the value reflects the line state.
pub trait DigitalInput {
    /// Current line level
    fn level(&self) -> crate::Result<Level>;

    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> crate::Result<bool> {
        self.level().map(Level::is_high)
    }

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> crate::Result<bool> {
        self.is_high().map(|h| !h)
    }
}

/// Pin that can be used for both input and output
pub trait DigitalIo: DigitalOutput + DigitalInput {}

// Blanket implementation for types that implement both traits
impl<T: DigitalOutput + DigitalInput> DigitalIo for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_triggers() {
        assert!(InterruptMode::RisingEdge.fires(Level::Low, Level::High));
        assert!(!InterruptMode::RisingEdge.fires(Level::High, Level::Low));
        assert!(InterruptMode::FallingEdge.fires(Level::High, Level::Low));
        assert!(InterruptMode::BothEdge.fires(Level::High, Level::Low));
        assert!(InterruptMode::BothEdge.fires(Level::Low, Level::High));
        assert!(!InterruptMode::BothEdge.fires(Level::Low, Level::Low));
    }

    #[test]
    fn test_level_triggers_repeat() {
        assert!(InterruptMode::HighLevel.fires(Level::High, Level::High));
        assert!(InterruptMode::LowLevel.fires(Level::High, Level::Low));
        assert!(!InterruptMode::LowLevel.fires(Level::Low, Level::High));
    }

    /// Mock pin for the default methods
    struct MockPin {
        level: Level,
    }

    impl DigitalOutput for MockPin {
        fn set_level(&mut self, level: Level) -> crate::Result<()> {
            self.level = level;
            Ok(())
        }
    }

    impl DigitalInput for MockPin {
        fn level(&self) -> crate::Result<Level> {
            Ok(self.level)
        }
    }

    #[test]
    fn test_default_methods() {
        let mut pin = MockPin { level: Level::Low };
        pin.set_high().unwrap();
        assert!(pin.is_high().unwrap());
        pin.set_low().unwrap();
        assert!(pin.is_low().unwrap());
        assert_eq!(Level::from(true).inverted(), Level::Low);
    }
}
