// MCP3021 10-bit single-channel ADC
//
// No registers: a two-byte read returns the latest conversion as
// 0000 D9..D6 | D5..D0 xx. The transfer function is linear against the
// reference, one LSB = Vref / 1024.

use embedded_hal::i2c::I2c;
use log::warn;

use super::AnalogSampler;
use crate::error::DeviceError;

pub const RESOLUTION: u32 = 1024;

const CODE_MASK: u16 = 0x3FF;

pub struct Mcp3021<D> {
    address: u8,
    i2c: Option<D>,
}

impl<D> Mcp3021<D> {
    pub const fn new(address: u8) -> Self {
        Self { address, i2c: None }
    }
}

impl<D: I2c> Mcp3021<D> {
    /// One conversion, with bus errors reported.
    pub fn try_read(&mut self) -> Result<u16, DeviceError> {
        let addr = self.address;
        let i2c = self.i2c.as_mut().ok_or(DeviceError::NotInitialized)?;

        let mut buf = [0u8; 2];
        i2c.read(addr, &mut buf).map_err(DeviceError::i2c)?;
        Ok(((buf[0] as u16 & 0x0F) << 6) | (buf[1] as u16 >> 2))
    }
}

impl<D: I2c> AnalogSampler for Mcp3021<D> {
    type Device = D;

    fn address(&self) -> u8 {
        self.address
    }

    fn init(&mut self, device: D) {
        self.i2c = Some(device);
    }

    fn read(&mut self) -> u16 {
        match self.try_read() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("[ADC] 0x{:02X} read failed: {}", self.address, e);
                0
            }
        }
    }

    // bits above the 10-bit code are ignored, so the result fits a u16
    fn to_voltage(&self, raw: u16, ref_voltage_mv: u16) -> u16 {
        ((raw & CODE_MASK) as u32 * ref_voltage_mv as u32 / RESOLUTION) as u16
    }
}
