//! SPI bus abstractions
//!
//! Provides SPI configuration and a trait for synchronous master transfers.

/// Mode flag: clock idles high
pub const MODE_CPOL: u16 = 1 << 1;

/// Mode flag: data captured on the second clock transition
pub const MODE_CPHA: u16 = 1 << 2;

/// Byte clocked out when the transmit side has nothing to send
pub const FILL_BYTE: u8 = 0x00;

/// SPI bus master
pub trait SpiBus {
    /// Write data without reading
    fn write(&mut self, data: &[u8]) -> crate::Result<()>;

    /// Read data (clocks out [`FILL_BYTE`])
    fn read(&mut self, buf: &mut [u8]) -> crate::Result<()>;

    /// Simultaneous send and receive
    ///
    /// Lengths are independent: `max(write.len(), read.len())` bytes are
    /// clocked, the transmit side is padded with [`FILL_BYTE`] and received
    /// bytes beyond `read.len()` are discarded.
    fn transceive(&mut self, write: &[u8], read: &mut [u8]) -> crate::Result<()>;
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Clock polarity
    pub polarity: Polarity,
    /// Clock phase
    pub phase: Phase,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            frequency: 1_000_000, // 1 MHz
            polarity: Polarity::IdleLow,
            phase: Phase::CaptureOnFirstTransition,
        }
    }
}

impl SpiConfig {
    /// Build a config from a frequency and raw mode flags
    pub const fn from_flags(frequency: u32, flags: u16) -> Self {
        let polarity = if flags & MODE_CPOL != 0 {
            Polarity::IdleHigh
        } else {
            Polarity::IdleLow
        };
        let phase = if flags & MODE_CPHA != 0 {
            Phase::CaptureOnSecondTransition
        } else {
            Phase::CaptureOnFirstTransition
        };
        Self {
            frequency,
            polarity,
            phase,
        }
    }

    /// Raw mode flags for this config
    pub const fn flags(&self) -> u16 {
        let mut flags = 0;
        if matches!(self.polarity, Polarity::IdleHigh) {
            flags |= MODE_CPOL;
        }
        if matches!(self.phase, Phase::CaptureOnSecondTransition) {
            flags |= MODE_CPHA;
        }
        flags
    }

    /// Combined mode number
    pub fn mode(&self) -> Mode {
        match (self.polarity, self.phase) {
            (Polarity::IdleLow, Phase::CaptureOnFirstTransition) => Mode::Mode0,
            (Polarity::IdleLow, Phase::CaptureOnSecondTransition) => Mode::Mode1,
            (Polarity::IdleHigh, Phase::CaptureOnFirstTransition) => Mode::Mode2,
            (Polarity::IdleHigh, Phase::CaptureOnSecondTransition) => Mode::Mode3,
        }
    }

    /// Reject a zero clock
    pub const fn validate(&self) -> crate::Result<()> {
        if self.frequency == 0 {
            Err(crate::Error::InvalidArgument)
        } else {
            Ok(())
        }
    }
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}
