// Driver stack for the RTC add-on module: RV-3028 clock, two 24C32
// EEPROMs and an MCP3021 watching the backup battery, all on one I2C bus.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod board;
pub mod drivers;
pub mod error;
pub mod module;
pub mod time;

pub use board::{Addresses, BoardModule, ClockConfig, CriticalSectionI2c, SharedI2c};
pub use error::{ConfigError, DeviceError, Error};
pub use module::{BatteryStatus, InitReport, RtcModule};
pub use time::{ClockTime, HostClock, LocalTime};

#[cfg(feature = "std")]
pub use time::SystemHostClock;
