//! UART serial communication abstractions
//!
//! Provides framing configuration and traits for serial transmit and
//! receive with timeouts.

use crate::Timeout;

/// UART transmitter
pub trait UartTx {
    /// Write data to the UART
    ///
    /// Blocks until all data has been handed to the transmitter.
    fn write(&mut self, data: &[u8]) -> crate::Result<()>;

    /// Write a single byte
    fn char_put(&mut self, byte: u8) -> crate::Result<()> {
        self.write(&[byte])
    }
}

/// UART receiver
pub trait UartRx {
    /// Read data from the UART
    ///
    /// Blocks until `buf` is full or `timeout` expires. Returns the number
    /// of bytes read; `Ok(0)` means nothing arrived before the deadline.
    fn read(&mut self, buf: &mut [u8], timeout: Timeout) -> crate::Result<usize>;

    /// Read a single byte, `Ok(None)` on timeout
    fn char_get(&mut self, timeout: Timeout) -> crate::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.read(&mut buf, timeout)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

/// Combined UART interface
///
/// For UARTs that provide both TX and RX on a single peripheral.
pub trait Uart: UartTx + UartRx {}

// Blanket implementation
impl<T: UartTx + UartRx> Uart for T {}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baud_rate: u32,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Number of data bits
    pub data_bits: DataBits,
    /// Receive ring buffer depth in bytes
    pub read_buf_len: usize,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            parity: Parity::None,
            stop_bits: StopBits::One,
            data_bits: DataBits::Eight,
            read_buf_len: 64,
        }
    }
}

impl UartConfig {
    /// Config with a given baud rate and defaults otherwise
    pub fn with_baud_rate(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }

    /// Reject zero baud rates and empty receive buffers
    pub const fn validate(&self) -> crate::Result<()> {
        if self.baud_rate == 0 || self.read_buf_len == 0 {
            Err(crate::Error::InvalidArgument)
        } else {
            Ok(())
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataBits {
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopBits {
    One,
    Two,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(UartConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        assert!(UartConfig::with_baud_rate(0).validate().is_err());
        let cfg = UartConfig {
            read_buf_len: 0,
            ..UartConfig::default()
        };
        assert_eq!(cfg.validate(), Err(crate::Error::InvalidArgument));
    }

    struct Script {
        bytes: &'static [u8],
    }

    impl UartRx for Script {
        fn read(&mut self, buf: &mut [u8], _timeout: Timeout) -> crate::Result<usize> {
            let n = buf.len().min(self.bytes.len());
            buf[..n].copy_from_slice(&self.bytes[..n]);
            self.bytes = &self.bytes[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_char_get_reports_timeout_as_none() {
        let mut rx = Script { bytes: b"A" };
        assert_eq!(rx.char_get(Timeout::NoWait), Ok(Some(b'A')));
        assert_eq!(rx.char_get(Timeout::NoWait), Ok(None));
    }
}
