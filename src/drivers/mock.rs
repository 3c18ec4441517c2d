// Recording I2C bus for driver tests
//
// Each simulated device is a flat memory with an auto-incrementing
// pointer. The first `addr_bytes` bytes of every write set the pointer
// (1 for register-mapped chips, 2 for 24-series EEPROMs, 0 for the ADC).

use std::vec::Vec;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Write { addr: u8, data: Vec<u8> },
    Read { addr: u8, len: usize },
}

struct MockDevice {
    addr: u8,
    addr_bytes: usize,
    mem: Vec<u8>,
    pointer: usize,
    // NACK this many transactions after every data write
    busy_after_write: u32,
    busy: u32,
}

pub struct MockI2c {
    devices: Vec<MockDevice>,
    log: Vec<Transfer>,
    fail: Option<ErrorKind>,
}

impl MockI2c {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            log: Vec::new(),
            fail: None,
        }
    }

    pub fn with_device(mut self, addr: u8, addr_bytes: usize, size: usize) -> Self {
        self.devices.push(MockDevice {
            addr,
            addr_bytes,
            mem: vec![0u8; size],
            pointer: 0,
            busy_after_write: 0,
            busy: 0,
        });
        self
    }

    pub fn with_busy_after_write(mut self, addr: u8, polls: u32) -> Self {
        if let Some(dev) = self.device_mut(addr) {
            dev.busy_after_write = polls;
        }
        self
    }

    /// Every following transaction fails with `kind` until cleared.
    pub fn fail_with(&mut self, kind: Option<ErrorKind>) {
        self.fail = kind;
    }

    pub fn mem(&self, addr: u8) -> &[u8] {
        self.devices
            .iter()
            .find(|d| d.addr == addr)
            .map(|d| d.mem.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_mem(&mut self, addr: u8, offset: usize, data: &[u8]) {
        if let Some(dev) = self.device_mut(addr) {
            dev.mem[offset..offset + data.len()].copy_from_slice(data);
        }
    }

    pub fn log(&self) -> &[Transfer] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn device_mut(&mut self, addr: u8) -> Option<&mut MockDevice> {
        self.devices.iter_mut().find(|d| d.addr == addr)
    }
}

impl ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if let Some(kind) = self.fail {
            return Err(kind);
        }

        let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
        let Some(dev) = self.devices.iter_mut().find(|d| d.addr == address) else {
            return Err(nack);
        };
        if dev.busy > 0 {
            dev.busy -= 1;
            return Err(nack);
        }
        if dev.addr_bytes == 0 {
            dev.pointer = 0;
        }

        let len = dev.mem.len();
        let mut wrote_data = false;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    self.log.push(Transfer::Write {
                        addr: address,
                        data: bytes.to_vec(),
                    });
                    let (ptr, data) = bytes.split_at(dev.addr_bytes.min(bytes.len()));
                    if !ptr.is_empty() {
                        dev.pointer = ptr.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize) % len;
                    }
                    for b in data {
                        dev.mem[dev.pointer] = *b;
                        dev.pointer = (dev.pointer + 1) % len;
                    }
                    wrote_data |= !data.is_empty();
                }
                Operation::Read(buf) => {
                    self.log.push(Transfer::Read {
                        addr: address,
                        len: buf.len(),
                    });
                    for b in buf.iter_mut() {
                        *b = dev.mem[dev.pointer];
                        dev.pointer = (dev.pointer + 1) % len;
                    }
                }
            }
        }

        if wrote_data {
            dev.busy = dev.busy_after_write;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_write_then_read_back() {
        let mut bus = MockI2c::new().with_device(0x52, 1, 0x40);
        bus.write(0x52, &[0x10, 0xAA, 0xBB]).unwrap();

        let mut buf = [0u8; 2];
        bus.write_read(0x52, &[0x10], &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xBB]);
        assert_eq!(&bus.mem(0x52)[0x10..0x12], &[0xAA, 0xBB]);
    }

    #[test]
    fn unknown_address_nacks() {
        let mut bus = MockI2c::new();
        let err = bus.write(0x20, &[0]).unwrap_err();
        assert_eq!(err, ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
    }

    #[test]
    fn busy_after_write_nacks_then_recovers() {
        let mut bus = MockI2c::new()
            .with_device(0x50, 2, 64)
            .with_busy_after_write(0x50, 2);
        bus.write(0x50, &[0x00, 0x00, 0x11]).unwrap();

        let mut ack = [0u8; 1];
        assert!(bus.read(0x50, &mut ack).is_err());
        assert!(bus.read(0x50, &mut ack).is_err());
        assert!(bus.read(0x50, &mut ack).is_ok());
    }
}
