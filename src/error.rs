// Error types for the chip drivers and the module front-end.
//
// DeviceError is what a single peripheral reports; Error is what the
// module hands back to its caller. Nothing here is retried internally.

use core::fmt;

use embedded_hal::i2c::{self, ErrorKind};

/// Failure reported by one peripheral driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// Bus fault or missing acknowledge.
    Transport(ErrorKind),
    /// Field out of range or write refused by the device.
    Rejected,
    /// Driver used before it was given a bus handle.
    NotInitialized,
    /// Device stayed busy past the polling budget.
    Timeout,
}

impl DeviceError {
    pub fn i2c<E: i2c::Error>(err: E) -> Self {
        DeviceError::Transport(err.kind())
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Transport(kind) => write!(f, "transport: {}", kind),
            DeviceError::Rejected => write!(f, "write rejected"),
            DeviceError::NotInitialized => write!(f, "not initialized"),
            DeviceError::Timeout => write!(f, "busy timeout"),
        }
    }
}

/// Failure surfaced by [`RtcModule`](crate::module::RtcModule).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Bus unreachable or a peripheral did not acknowledge.
    Transport(ErrorKind),
    /// Host wall clock has not been set.
    HostTimeUnavailable,
    /// The peripheral refused the requested register write.
    DeviceWriteRejected,
    /// Operation attempted before `initialize`.
    NotInitialized,
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Transport(kind) => Error::Transport(kind),
            DeviceError::Rejected => Error::DeviceWriteRejected,
            DeviceError::NotInitialized => Error::NotInitialized,
            DeviceError::Timeout => Error::Transport(ErrorKind::Other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(kind) => write!(f, "I2C transport failure: {}", kind),
            Error::HostTimeUnavailable => write!(f, "host time unavailable"),
            Error::DeviceWriteRejected => write!(f, "device rejected write"),
            Error::NotInitialized => write!(f, "module not initialized"),
        }
    }
}

/// Invalid board addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Not a usable 7-bit address (reserved or out of range).
    InvalidAddress(u8),
    /// Address used twice, or collides with the RTC.
    AddressConflict(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAddress(addr) => write!(f, "invalid I2C address 0x{:02X}", addr),
            ConfigError::AddressConflict(addr) => write!(f, "I2C address 0x{:02X} already in use", addr),
        }
    }
}
