//! I2S audio interface
//!
//! Configuration records and the per-direction trigger state machine.
//! Transitions are pure so drivers and controllers share one definition.

use crate::{Error, Result, Timeout};

/// Data order: most significant bit first
pub const DATA_ORDER_MSB: u32 = 0 << 3;
/// Data order: least significant bit first
pub const DATA_ORDER_LSB: u32 = 1 << 3;
/// Invert bit clock
pub const BIT_CLK_INV: u32 = 1 << 4;
/// Invert frame clock
pub const FRAME_CLK_INV: u32 = 1 << 5;
/// Bit clock runs continuously
pub const BIT_CLK_CONT: u32 = 0;
/// Bit clock is gated between frames
pub const BIT_CLK_GATED: u32 = 1;
/// Bit clock generated locally
pub const BIT_CLK_MASTER: u32 = 0 << 1;
/// Bit clock supplied externally
pub const BIT_CLK_SLAVE: u32 = 1 << 1;
/// Frame clock generated locally
pub const FRAME_CLK_MASTER: u32 = 0 << 2;
/// Frame clock supplied externally
pub const FRAME_CLK_SLAVE: u32 = 1 << 2;

/// Frame format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum I2sMode {
    Philips,
    RightJustified,
    LeftJustified,
}

/// Stream direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2sDir {
    Rx,
    Tx,
    Both,
}

impl I2sDir {
    pub const fn includes_rx(self) -> bool {
        matches!(self, I2sDir::Rx | I2sDir::Both)
    }

    pub const fn includes_tx(self) -> bool {
        matches!(self, I2sDir::Tx | I2sDir::Both)
    }
}

/// Stream trigger command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2sTrigger {
    /// Start the transmission / reception of data
    Start,
    /// Stop after the current block
    Stop,
    /// Stop after the transmit queue has been emptied
    Drain,
    /// Discard queued blocks and stop immediately
    Drop,
    /// Recover after an underrun/overrun
    Prepare,
}

/// Per-direction stream state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2sState {
    /// Not configured
    #[default]
    NotReady,
    /// Configured, not streaming
    Ready,
    /// Streaming
    Running,
    /// Finishing queued blocks
    Stopping,
    /// Underrun (tx) or overrun (rx)
    Error,
}

impl I2sState {
    /// State after applying a trigger command
    ///
    /// `Stop` and `Drain` move a running stream to `Stopping`; the
    /// controller completes the move to `Ready` once its queue is empty.
    pub const fn trigger(self, cmd: I2sTrigger) -> Result<I2sState> {
        match (self, cmd) {
            (I2sState::Ready, I2sTrigger::Start) => Ok(I2sState::Running),
            (I2sState::Running, I2sTrigger::Stop | I2sTrigger::Drain) => Ok(I2sState::Stopping),
            (I2sState::NotReady, I2sTrigger::Drop) => Err(Error::InvalidState),
            (_, I2sTrigger::Drop) => Ok(I2sState::Ready),
            (I2sState::Error, I2sTrigger::Prepare) => Ok(I2sState::Ready),
            _ => Err(Error::InvalidState),
        }
    }

    /// Whether a new configuration may be applied
    pub const fn accepts_config(self) -> bool {
        matches!(self, I2sState::NotReady | I2sState::Ready)
    }
}

/// Stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct I2sConfig {
    /// Frame format
    pub mode: I2sMode,
    /// Option flags (`DATA_ORDER_*`, `*_CLK_*`)
    pub options: u32,
    /// Words per frame
    pub channels: u8,
    /// Bits per sample: 8, 16, 24 or 32
    pub sample_bits: u8,
    /// Frames per second
    pub sample_rate: u32,
    /// Bytes per queued block
    pub block_size: usize,
    /// How long read/write may wait for a block
    pub timeout: Timeout,
}

impl Default for I2sConfig {
    fn default() -> Self {
        Self {
            mode: I2sMode::Philips,
            options: DATA_ORDER_MSB | BIT_CLK_MASTER | FRAME_CLK_MASTER,
            channels: 2,
            sample_bits: 16,
            sample_rate: 48_000,
            block_size: 512,
            timeout: Timeout::Millis(1_000),
        }
    }
}

impl I2sConfig {
    pub const fn validate(&self) -> Result<()> {
        if !matches!(self.sample_bits, 8 | 16 | 24 | 32) {
            return Err(Error::InvalidArgument);
        }
        if self.channels == 0 || self.sample_rate == 0 || self.block_size == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Bytes per frame (all channels)
    pub const fn frame_bytes(&self) -> usize {
        self.channels as usize * (self.sample_bits as usize / 8)
    }
}
