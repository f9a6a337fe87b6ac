//! Error taxonomy
//!
//! Every peripheral and OS operation reports failure through [`Error`].
//! Callers that speak the C-style status convention can convert errors to
//! negative errno values with [`Error::errno`] and back with
//! [`Error::from_errno`].

use core::fmt;

/// errno values from the newlib/Zephyr table
mod errno {
    pub const EPERM: i32 = 1;
    pub const EIO: i32 = 5;
    pub const EBADF: i32 = 9;
    pub const EAGAIN: i32 = 11;
    pub const EACCES: i32 = 13;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
    pub const ENOMSG: i32 = 35;
    pub const ENOTSUP: i32 = 134;
}

/// Errors from peripheral, registry and OS primitive operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Out-of-range id, malformed configuration, pulse longer than period
    InvalidArgument,
    /// Device already open, queue full without waiting, resource in use
    Busy,
    /// A blocking operation reached its deadline
    Timeout,
    /// Queue empty on a non-blocking receive, or a purge aborted the wait
    NoMessage,
    /// Mutex unlocked by a thread that does not own it
    PermissionDenied,
    /// Operation not valid in the current state (unconfigured, unlocked)
    InvalidState,
    /// Handle was closed or never issued by this registry
    InvalidHandle,
    /// Operation not supported for this configuration or context
    InvalidOperation,
    /// Underlying transfer failure (bus NACK, UART framing error)
    Io,
}

/// Result type for all boardio operations
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Negative errno value for this error
    pub const fn errno(self) -> i32 {
        -(match self {
            Error::InvalidArgument => errno::EINVAL,
            Error::Busy => errno::EBUSY,
            Error::Timeout => errno::EAGAIN,
            Error::NoMessage => errno::ENOMSG,
            Error::PermissionDenied => errno::EPERM,
            Error::InvalidState => errno::EACCES,
            Error::InvalidHandle => errno::EBADF,
            Error::InvalidOperation => errno::ENOTSUP,
            Error::Io => errno::EIO,
        })
    }

    /// Map a (negative) errno value back to an error
    ///
    /// Returns `None` for zero, positive values and codes outside the
    /// taxonomy.
    pub const fn from_errno(code: i32) -> Option<Self> {
        if code >= 0 {
            return None;
        }
        match -code {
            errno::EINVAL => Some(Error::InvalidArgument),
            errno::EBUSY => Some(Error::Busy),
            errno::EAGAIN => Some(Error::Timeout),
            errno::ENOMSG => Some(Error::NoMessage),
            errno::EPERM => Some(Error::PermissionDenied),
            errno::EACCES => Some(Error::InvalidState),
            errno::EBADF => Some(Error::InvalidHandle),
            errno::ENOTSUP => Some(Error::InvalidOperation),
            errno::EIO => Some(Error::Io),
            _ => None,
        }
    }
}

/// Collapse a unit result into a C-style status (0 or negative errno)
pub fn status_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.errno(),
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidArgument => "invalid argument",
            Error::Busy => "resource busy",
            Error::Timeout => "timed out",
            Error::NoMessage => "no message available",
            Error::PermissionDenied => "permission denied",
            Error::InvalidState => "invalid state",
            Error::InvalidHandle => "invalid handle",
            Error::InvalidOperation => "operation not supported",
            Error::Io => "i/o error",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl embedded_hal::digital::Error for Error {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            Error::Io => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Error::Busy => ErrorKind::ArbitrationLoss,
            _ => ErrorKind::Other,
        }
    }
}

impl embedded_hal::spi::Error for Error {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}

impl embedded_hal::pwm::Error for Error {
    fn kind(&self) -> embedded_hal::pwm::ErrorKind {
        embedded_hal::pwm::ErrorKind::Other
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind;
        match self {
            Error::InvalidArgument => ErrorKind::InvalidInput,
            Error::Timeout => ErrorKind::TimedOut,
            Error::PermissionDenied => ErrorKind::PermissionDenied,
            Error::InvalidOperation => ErrorKind::Unsupported,
            Error::InvalidHandle => ErrorKind::NotConnected,
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Error; 9] = [
        Error::InvalidArgument,
        Error::Busy,
        Error::Timeout,
        Error::NoMessage,
        Error::PermissionDenied,
        Error::InvalidState,
        Error::InvalidHandle,
        Error::InvalidOperation,
        Error::Io,
    ];

    #[test]
    fn test_errno_is_negative_and_unique() {
        for (i, a) in ALL.iter().enumerate() {
            assert!(a.errno() < 0);
            for b in &ALL[i + 1..] {
                assert_ne!(a.errno(), b.errno(), "{:?} and {:?} share a code", a, b);
            }
        }
    }

    #[test]
    fn test_errno_mapping_reverses() {
        for e in ALL {
            assert_eq!(Error::from_errno(e.errno()), Some(e));
        }
    }

    #[test]
    fn test_posix_values() {
        assert_eq!(Error::InvalidArgument.errno(), -22);
        assert_eq!(Error::Busy.errno(), -16);
        assert_eq!(Error::Io.errno(), -5);
        assert_eq!(Error::PermissionDenied.errno(), -1);
    }

    #[test]
    fn test_from_errno_rejects_non_errors() {
        assert_eq!(Error::from_errno(0), None);
        assert_eq!(Error::from_errno(22), None);
        assert_eq!(Error::from_errno(-9999), None);
    }

    #[test]
    fn test_status_code() {
        assert_eq!(status_code(Ok(())), 0);
        assert_eq!(status_code(Err(Error::Busy)), -16);
    }
}
