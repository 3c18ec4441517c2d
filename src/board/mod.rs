//! RTC add-on module board definition
//!
//! Maps the module's fixed hardware onto the chip drivers: I2C addresses,
//! ADC reference, battery threshold and the shared-bus handles. Nothing
//! outside this module should need to know an address.
//!
//! Bus map:
//! Addr |     Device      |      Notes
//! 0x52 | RV-3028-C7 RTC  | fixed by the chip, not strappable
//! 0x50 | EEPROM 0        | 24C32, 4 KiB
//! 0x51 | EEPROM 1        | 24C32, 4 KiB
//! 0x48 | MCP3021 ADC     | backup battery, Vref = 4.096V

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::{CriticalSectionDevice, RefCellDevice};
use log::debug;

use crate::drivers::BusTransport;
use crate::drivers::eeprom::Eeprom24x;
use crate::drivers::mcp3021::Mcp3021;
use crate::drivers::rv3028::Rv3028;
use crate::error::ConfigError;
use crate::module::RtcModule;

pub use crate::drivers::ClockConfig;
pub use crate::drivers::rv3028::RTC_ADDR;

pub const DEFAULT_EEPROM0_ADDR: u8 = 0x50;
pub const DEFAULT_EEPROM1_ADDR: u8 = 0x51;
pub const DEFAULT_ADC_ADDR: u8 = 0x48;

/// ADC reference for this hardware revision.
pub const REF_VOLTAGE_MV: u16 = 4096;

/// Battery is healthy strictly above this.
pub const BATTERY_LOW_THRESHOLD_MV: u16 = 2500;

/// The module as populated: RV-3028, two 24C32s and an MCP3021 on bus `B`.
pub type BoardModule<B> = RtcModule<
    Rv3028<<B as BusTransport>::Device>,
    Eeprom24x<<B as BusTransport>::Device>,
    Mcp3021<<B as BusTransport>::Device>,
>;

/// Strappable peripheral addresses.
///
/// Always distinct, 7-bit, and clear of the RTC's fixed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addresses {
    eeprom0: u8,
    eeprom1: u8,
    adc: u8,
}

impl Default for Addresses {
    fn default() -> Self {
        Self {
            eeprom0: DEFAULT_EEPROM0_ADDR,
            eeprom1: DEFAULT_EEPROM1_ADDR,
            adc: DEFAULT_ADC_ADDR,
        }
    }
}

impl Addresses {
    pub fn new(eeprom0: u8, eeprom1: u8, adc: u8) -> Result<Self, ConfigError> {
        let all = [eeprom0, eeprom1, adc];
        for (i, &addr) in all.iter().enumerate() {
            // 0x00..=0x07 and 0x78..=0x7F are reserved I2C addresses
            if !(0x08..=0x77).contains(&addr) {
                return Err(ConfigError::InvalidAddress(addr));
            }
            if addr == RTC_ADDR || all[..i].contains(&addr) {
                return Err(ConfigError::AddressConflict(addr));
            }
        }
        Ok(Self { eeprom0, eeprom1, adc })
    }

    pub fn eeprom0(&self) -> u8 {
        self.eeprom0
    }

    pub fn eeprom1(&self) -> u8 {
        self.eeprom1
    }

    pub fn adc(&self) -> u8 {
        self.adc
    }
}

/// Bus borrowed from a `RefCell`, for single-context use.
pub struct SharedI2c<'a, I2C> {
    bus: &'a RefCell<I2C>,
    started: bool,
}

impl<'a, I2C> SharedI2c<'a, I2C> {
    pub fn new(bus: &'a RefCell<I2C>) -> Self {
        Self { bus, started: false }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl<'a, I2C: I2c> BusTransport for SharedI2c<'a, I2C> {
    type Device = RefCellDevice<'a, I2C>;

    // the HAL configures the peripheral when it is constructed
    fn start(&mut self) {
        if !self.started {
            debug!("[I2C] shared bus up");
            self.started = true;
        }
    }

    fn device(&self) -> Self::Device {
        RefCellDevice::new(self.bus)
    }
}

/// Bus behind a critical-section mutex, for use from interrupts or a
/// second core. Every transaction holds the lock for its duration.
pub struct CriticalSectionI2c<'a, I2C> {
    bus: &'a Mutex<RefCell<I2C>>,
    started: bool,
}

impl<'a, I2C> CriticalSectionI2c<'a, I2C> {
    pub fn new(bus: &'a Mutex<RefCell<I2C>>) -> Self {
        Self { bus, started: false }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl<'a, I2C: I2c> BusTransport for CriticalSectionI2c<'a, I2C> {
    type Device = CriticalSectionDevice<'a, I2C>;

    fn start(&mut self) {
        if !self.started {
            debug!("[I2C] critical-section bus up");
            self.started = true;
        }
    }

    fn device(&self) -> Self::Device {
        CriticalSectionDevice::new(self.bus)
    }
}
