// Peripheral drivers and the capability traits the module is built on.
//
// Drivers are chip-level and board-independent; addresses and bus
// wiring live in board. The module only talks to the traits below, so
// any chip (or a test double) satisfying them can be dropped in.

pub mod eeprom;
pub mod mcp3021;
pub mod rv3028;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::DeviceError;
use crate::time::ClockTime;

/// Shared bus the peripherals hang off.
///
/// The transport is borrowed, never owned: `device` hands out a fresh
/// handle onto the same bus for each peripheral.
pub trait BusTransport {
    type Device;

    /// Bring the bus up. Idempotent.
    fn start(&mut self);

    fn device(&self) -> Self::Device;
}

/// Power-up options for the clock device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub use_24_hour: bool,
    pub disable_trickle_charge: bool,
    pub level_switching: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            use_24_hour: true,
            disable_trickle_charge: true,
            level_switching: true,
        }
    }
}

/// A battery-backed real-time clock.
pub trait ClockDevice {
    type Device;

    fn begin(&mut self, device: Self::Device, config: ClockConfig) -> Result<(), DeviceError>;

    /// Write all time fields in one go. `time.hours` is 24-hour; the
    /// device stores it in whichever mode `begin` configured.
    fn set_time(&mut self, time: &ClockTime) -> Result<(), DeviceError>;

    fn clear_interrupts(&mut self) -> Result<(), DeviceError>;
    fn disable_alarm_interrupt(&mut self) -> Result<(), DeviceError>;
    fn clear_alarm_interrupt_flag(&mut self) -> Result<(), DeviceError>;
    fn disable_timer(&mut self) -> Result<(), DeviceError>;
    fn disable_timer_interrupt(&mut self) -> Result<(), DeviceError>;
    fn clear_timer_interrupt_flag(&mut self) -> Result<(), DeviceError>;
    fn disable_periodic_update_interrupt(&mut self) -> Result<(), DeviceError>;
    fn clear_periodic_update_interrupt_flag(&mut self) -> Result<(), DeviceError>;
    fn disable_clock_out(&mut self) -> Result<(), DeviceError>;
    fn clear_clock_output_interrupt_flag(&mut self) -> Result<(), DeviceError>;
    fn reset(&mut self) -> Result<(), DeviceError>;
}

/// A byte-addressable non-volatile store.
pub trait PersistentStore {
    type Device;

    fn address(&self) -> u8;

    fn capacity(&self) -> usize;

    fn attach(&mut self, device: Self::Device);

    fn read(&mut self, offset: u16, buf: &mut [u8]) -> Result<(), DeviceError>;

    fn write(&mut self, offset: u16, data: &[u8]) -> Result<(), DeviceError>;
}

/// A single-channel analog sampler.
///
/// `read` has no failure path: a sampler that cannot reach its chip
/// still returns a code, even if it is electrically meaningless.
pub trait AnalogSampler {
    type Device;

    fn address(&self) -> u8;

    fn init(&mut self, device: Self::Device);

    fn read(&mut self) -> u16;

    /// Millivolts for a code returned by `read`. Only the converter's
    /// native resolution is meaningful in `raw`.
    fn to_voltage(&self, raw: u16, ref_voltage_mv: u16) -> u16;
}
