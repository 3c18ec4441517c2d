// 24-series I2C EEPROM (24C32 geometry)
//
// 16-bit memory address, big-endian, sent ahead of the data. Writes
// may not cross a 32-byte page, so longer writes are split; after each
// page the chip goes deaf for its internal write cycle (~5ms) and is
// polled until it acknowledges again.

use embedded_hal::i2c::I2c;
use log::{debug, warn};

use super::PersistentStore;
use crate::error::DeviceError;

pub const PAGE_SIZE: usize = 32;
pub const CAPACITY: usize = 4096;

const ACK_POLL_ATTEMPTS: u32 = 200;

pub struct Eeprom24x<D> {
    address: u8,
    i2c: Option<D>,
}

impl<D> Eeprom24x<D> {
    pub const fn new(address: u8) -> Self {
        Self { address, i2c: None }
    }

    pub fn is_attached(&self) -> bool {
        self.i2c.is_some()
    }
}

impl<D: I2c> Eeprom24x<D> {
    fn bus(&mut self) -> Result<&mut D, DeviceError> {
        self.i2c.as_mut().ok_or(DeviceError::NotInitialized)
    }

    fn check_range(offset: u16, len: usize) -> Result<(), DeviceError> {
        if offset as usize + len > CAPACITY {
            return Err(DeviceError::Rejected);
        }
        Ok(())
    }

    fn write_page(&mut self, offset: u16, chunk: &[u8]) -> Result<(), DeviceError> {
        let mut frame = [0u8; 2 + PAGE_SIZE];
        frame[..2].copy_from_slice(&offset.to_be_bytes());
        frame[2..2 + chunk.len()].copy_from_slice(chunk);

        let addr = self.address;
        self.bus()?
            .write(addr, &frame[..2 + chunk.len()])
            .map_err(DeviceError::i2c)?;
        self.wait_ready()
    }

    // acknowledge polling: the chip NACKs its address until the write cycle ends
    fn wait_ready(&mut self) -> Result<(), DeviceError> {
        let addr = self.address;
        let bus = self.bus()?;
        let mut ack = [0u8; 1];
        for _ in 0..ACK_POLL_ATTEMPTS {
            if bus.read(addr, &mut ack).is_ok() {
                return Ok(());
            }
        }
        warn!("[EEPROM] 0x{:02X} still busy after write", addr);
        Err(DeviceError::Timeout)
    }
}

impl<D: I2c> PersistentStore for Eeprom24x<D> {
    type Device = D;

    fn address(&self) -> u8 {
        self.address
    }

    fn capacity(&self) -> usize {
        CAPACITY
    }

    fn attach(&mut self, device: D) {
        self.i2c = Some(device);
    }

    fn read(&mut self, offset: u16, buf: &mut [u8]) -> Result<(), DeviceError> {
        Self::check_range(offset, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        let addr = self.address;
        self.bus()?
            .write_read(addr, &offset.to_be_bytes(), buf)
            .map_err(DeviceError::i2c)
    }

    fn write(&mut self, offset: u16, data: &[u8]) -> Result<(), DeviceError> {
        Self::check_range(offset, data.len())?;

        let mut offset = offset as usize;
        let mut rest = data;
        while !rest.is_empty() {
            let room = PAGE_SIZE - offset % PAGE_SIZE;
            let (chunk, tail) = rest.split_at(room.min(rest.len()));
            self.write_page(offset as u16, chunk)?;
            offset += chunk.len();
            rest = tail;
        }

        debug!("[EEPROM] 0x{:02X}: wrote {} bytes", self.address, data.len());
        Ok(())
    }
}
