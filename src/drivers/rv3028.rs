// RV-3028-C7 real-time clock (board-independent)
//
// Fixed address 0x52. Time registers are BCD, written as one burst
// from SECONDS. Configuration that must survive power loss (trickle
// charge, backup switchover, CLKOUT) lives in EEPROM and is mirrored in
// RAM at 0x35..=0x37; a mirror change only sticks after the EEPROM
// update command, which runs with auto-refresh disabled.

use embedded_hal::i2c::I2c;
use log::{debug, info};

use super::{ClockConfig, ClockDevice};
use crate::error::DeviceError;
use crate::time::ClockTime;

pub const RTC_ADDR: u8 = 0x52;

// the EEPROM update takes ~63ms; at 100kHz each status poll is ~0.3ms
const EEPROM_BUSY_POLLS: u32 = 500;

const YEAR_BASE: u16 = 2000;

// upper nibble of the ID register, the lower one is the silicon revision
const HID: u8 = 0x3;

#[allow(dead_code)]
mod reg {
    pub const SECONDS: u8 = 0x00;
    pub const MINUTES: u8 = 0x01;
    pub const HOURS: u8 = 0x02;
    pub const WEEKDAY: u8 = 0x03;
    pub const DATE: u8 = 0x04;
    pub const MONTHS: u8 = 0x05;
    pub const YEARS: u8 = 0x06;
    pub const STATUS: u8 = 0x0E;
    pub const CTRL1: u8 = 0x0F;
    pub const CTRL2: u8 = 0x10;
    pub const EEADDR: u8 = 0x25;
    pub const EEDATA: u8 = 0x26;
    pub const EECMD: u8 = 0x27;
    pub const ID: u8 = 0x28;
    pub const EEPROM_CLKOUT: u8 = 0x35;
    pub const EEPROM_BACKUP: u8 = 0x37;
}

#[allow(dead_code)]
mod bit {
    // STATUS
    pub const EEBUSY: u8 = 1 << 7;
    pub const CLKF: u8 = 1 << 6;
    pub const UF: u8 = 1 << 4;
    pub const TF: u8 = 1 << 3;
    pub const AF: u8 = 1 << 2;
    // CTRL1
    pub const EERD: u8 = 1 << 3;
    pub const TE: u8 = 1 << 2;
    // CTRL2
    pub const UIE: u8 = 1 << 5;
    pub const TIE: u8 = 1 << 4;
    pub const AIE: u8 = 1 << 3;
    pub const TWELVE_24: u8 = 1 << 1;
    pub const RESET: u8 = 1 << 0;
    // HOURS in 12-hour mode
    pub const PM: u8 = 1 << 5;
    // EEPROM_CLKOUT
    pub const CLKOE: u8 = 1 << 7;
    // EEPROM_BACKUP
    pub const TCE: u8 = 1 << 5;
    pub const BSM_MASK: u8 = 0b11 << 2;
    pub const BSM_LEVEL_SWITCHING: u8 = 0b11 << 2;
}

mod cmd {
    pub const FIRST: u8 = 0x00;
    pub const UPDATE: u8 = 0x11;
}

pub struct Rv3028<D> {
    i2c: Option<D>,
    twelve_hour: bool,
}

impl<D> Default for Rv3028<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> Rv3028<D> {
    pub const fn new() -> Self {
        Self {
            i2c: None,
            twelve_hour: false,
        }
    }

    pub fn is_12_hour(&self) -> bool {
        self.twelve_hour
    }

    pub fn release(self) -> Option<D> {
        self.i2c
    }
}

impl<D: I2c> Rv3028<D> {
    /// Read the current time back (hours normalised to 24-hour).
    pub fn time(&mut self) -> Result<ClockTime, DeviceError> {
        let mut raw = [0u8; 7];
        self.bus()?
            .write_read(RTC_ADDR, &[reg::SECONDS], &mut raw)
            .map_err(DeviceError::i2c)?;

        Ok(ClockTime {
            seconds: from_bcd(raw[0] & 0x7F),
            minutes: from_bcd(raw[1] & 0x7F),
            hours: decode_hours(raw[2], self.twelve_hour),
            weekday: raw[3] & 0x07,
            day: from_bcd(raw[4] & 0x3F),
            month: from_bcd(raw[5] & 0x1F),
            year: YEAR_BASE + from_bcd(raw[6]) as u16,
        })
    }

    fn bus(&mut self) -> Result<&mut D, DeviceError> {
        self.i2c.as_mut().ok_or(DeviceError::NotInitialized)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, DeviceError> {
        let mut buf = [0u8; 1];
        self.bus()?
            .write_read(RTC_ADDR, &[reg], &mut buf)
            .map_err(DeviceError::i2c)?;
        Ok(buf[0])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), DeviceError> {
        self.bus()?
            .write(RTC_ADDR, &[reg, value])
            .map_err(DeviceError::i2c)
    }

    // read-modify-write; returns whether the register changed
    fn update_reg(&mut self, reg: u8, clear: u8, set: u8) -> Result<bool, DeviceError> {
        let old = self.read_reg(reg)?;
        let new = (old & !clear) | set;
        if new != old {
            self.write_reg(reg, new)?;
        }
        Ok(new != old)
    }

    fn set_hour_mode(&mut self, twelve_hour: bool) -> Result<(), DeviceError> {
        let ctrl2 = self.read_reg(reg::CTRL2)?;
        let current = ctrl2 & bit::TWELVE_24 != 0;
        if current != twelve_hour {
            // stored hour must be re-encoded for the new mode
            let hours = decode_hours(self.read_reg(reg::HOURS)?, current);
            let ctrl2 = if twelve_hour {
                ctrl2 | bit::TWELVE_24
            } else {
                ctrl2 & !bit::TWELVE_24
            };
            self.write_reg(reg::CTRL2, ctrl2)?;
            self.write_reg(reg::HOURS, encode_hours(hours, twelve_hour))?;
        }
        self.twelve_hour = twelve_hour;
        Ok(())
    }

    // persist the RAM mirror of the configuration EEPROM
    fn commit_eeprom(&mut self) -> Result<(), DeviceError> {
        self.update_reg(reg::CTRL1, 0, bit::EERD)?;
        let result = self.run_eeprom_update();
        self.update_reg(reg::CTRL1, bit::EERD, 0)?;
        result
    }

    fn run_eeprom_update(&mut self) -> Result<(), DeviceError> {
        self.wait_eeprom_idle()?;
        self.write_reg(reg::EECMD, cmd::FIRST)?;
        self.write_reg(reg::EECMD, cmd::UPDATE)?;
        self.wait_eeprom_idle()
    }

    fn wait_eeprom_idle(&mut self) -> Result<(), DeviceError> {
        for _ in 0..EEPROM_BUSY_POLLS {
            if self.read_reg(reg::STATUS)? & bit::EEBUSY == 0 {
                return Ok(());
            }
        }
        Err(DeviceError::Timeout)
    }
}

impl<D: I2c> ClockDevice for Rv3028<D> {
    type Device = D;

    fn begin(&mut self, device: D, config: ClockConfig) -> Result<(), DeviceError> {
        self.i2c = Some(device);

        let id = self.read_reg(reg::ID)?;
        if id >> 4 != HID {
            debug!("[RTC] unexpected ID {:#04x} at {:#04x}", id, RTC_ADDR);
            return Err(DeviceError::Rejected);
        }

        self.set_hour_mode(!config.use_24_hour)?;

        let backup = self.read_reg(reg::EEPROM_BACKUP)?;
        let mut wanted = backup;
        if config.disable_trickle_charge {
            wanted &= !bit::TCE;
        }
        if config.level_switching {
            wanted = (wanted & !bit::BSM_MASK) | bit::BSM_LEVEL_SWITCHING;
        }
        if wanted != backup {
            self.write_reg(reg::EEPROM_BACKUP, wanted)?;
            self.commit_eeprom()?;
            debug!("[RTC] backup register {:#04x} -> {:#04x}", backup, wanted);
        }

        info!(
            "[RTC] ready ({}h, trickle {}, level switching {})",
            if self.twelve_hour { 12 } else { 24 },
            if wanted & bit::TCE != 0 { "on" } else { "off" },
            if wanted & bit::BSM_MASK == bit::BSM_LEVEL_SWITCHING { "on" } else { "off" },
        );
        Ok(())
    }

    fn set_time(&mut self, t: &ClockTime) -> Result<(), DeviceError> {
        if !is_valid(t) {
            debug!("[RTC] rejected time {:?}", t);
            return Err(DeviceError::Rejected);
        }

        let frame = [
            reg::SECONDS,
            bcd(t.seconds),
            bcd(t.minutes),
            encode_hours(t.hours, self.twelve_hour),
            t.weekday,
            bcd(t.day),
            bcd(t.month),
            bcd((t.year - YEAR_BASE) as u8),
        ];
        self.bus()?.write(RTC_ADDR, &frame).map_err(DeviceError::i2c)
    }

    fn clear_interrupts(&mut self) -> Result<(), DeviceError> {
        self.write_reg(reg::STATUS, 0x00)
    }

    fn disable_alarm_interrupt(&mut self) -> Result<(), DeviceError> {
        self.update_reg(reg::CTRL2, bit::AIE, 0).map(drop)
    }

    fn clear_alarm_interrupt_flag(&mut self) -> Result<(), DeviceError> {
        self.update_reg(reg::STATUS, bit::AF, 0).map(drop)
    }

    fn disable_timer(&mut self) -> Result<(), DeviceError> {
        self.update_reg(reg::CTRL1, bit::TE, 0).map(drop)
    }

    fn disable_timer_interrupt(&mut self) -> Result<(), DeviceError> {
        self.update_reg(reg::CTRL2, bit::TIE, 0).map(drop)
    }

    fn clear_timer_interrupt_flag(&mut self) -> Result<(), DeviceError> {
        self.update_reg(reg::STATUS, bit::TF, 0).map(drop)
    }

    fn disable_periodic_update_interrupt(&mut self) -> Result<(), DeviceError> {
        self.update_reg(reg::CTRL2, bit::UIE, 0).map(drop)
    }

    fn clear_periodic_update_interrupt_flag(&mut self) -> Result<(), DeviceError> {
        self.update_reg(reg::STATUS, bit::UF, 0).map(drop)
    }

    fn disable_clock_out(&mut self) -> Result<(), DeviceError> {
        if self.update_reg(reg::EEPROM_CLKOUT, bit::CLKOE, 0)? {
            self.commit_eeprom()?;
        }
        Ok(())
    }

    fn clear_clock_output_interrupt_flag(&mut self) -> Result<(), DeviceError> {
        self.update_reg(reg::STATUS, bit::CLKF, 0).map(drop)
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        self.update_reg(reg::CTRL2, 0, bit::RESET).map(drop)
    }
}

fn is_valid(t: &ClockTime) -> bool {
    t.seconds < 60
        && t.minutes < 60
        && t.hours < 24
        && t.weekday < 7
        && (1..=31).contains(&t.day)
        && (1..=12).contains(&t.month)
        && (YEAR_BASE..=YEAR_BASE + 99).contains(&t.year)
}

fn bcd(v: u8) -> u8 {
    ((v / 10) << 4) | (v % 10)
}

fn from_bcd(v: u8) -> u8 {
    (v >> 4) * 10 + (v & 0x0F)
}

fn encode_hours(h24: u8, twelve_hour: bool) -> u8 {
    if !twelve_hour {
        return bcd(h24);
    }
    let h12 = match h24 % 12 {
        0 => 12,
        h => h,
    };
    let pm = if h24 >= 12 { bit::PM } else { 0 };
    bcd(h12) | pm
}

fn decode_hours(raw: u8, twelve_hour: bool) -> u8 {
    if !twelve_hour {
        return from_bcd(raw & 0x3F);
    }
    let h12 = from_bcd(raw & 0x1F) % 12;
    if raw & bit::PM != 0 { h12 + 12 } else { h12 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::{MockI2c, Transfer};
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

    fn rtc_bus() -> MockI2c {
        let mut bus = MockI2c::new().with_device(RTC_ADDR, 1, 0x40);
        bus.set_mem(RTC_ADDR, reg::ID as usize, &[0x33]);
        bus
    }

    fn noon_2023() -> ClockTime {
        ClockTime {
            seconds: 30,
            minutes: 15,
            hours: 12,
            weekday: 3,
            day: 25,
            month: 1,
            year: 2023,
        }
    }

    #[test]
    fn twelve_hour_encoding() {
        assert_eq!(encode_hours(0, true), 0x12);
        assert_eq!(encode_hours(11, true), 0x11);
        assert_eq!(encode_hours(12, true), 0x12 | bit::PM);
        assert_eq!(encode_hours(23, true), 0x11 | bit::PM);
        assert_eq!(encode_hours(23, false), 0x23);

        for h in 0..24 {
            assert_eq!(decode_hours(encode_hours(h, true), true), h);
        }
    }

    #[test]
    fn begin_with_defaults_configures_backup_register() {
        let mut bus = rtc_bus();
        // trickle charge on, switchover disabled, 12-hour mode, 1 PM stored
        bus.set_mem(RTC_ADDR, reg::EEPROM_BACKUP as usize, &[bit::TCE]);
        bus.set_mem(RTC_ADDR, reg::CTRL2 as usize, &[bit::TWELVE_24]);
        bus.set_mem(RTC_ADDR, reg::HOURS as usize, &[0x01 | bit::PM]);

        let mut rtc = Rv3028::new();
        rtc.begin(bus, ClockConfig::default()).unwrap();
        assert!(!rtc.is_12_hour());

        let bus = rtc.release().unwrap();
        let mem = bus.mem(RTC_ADDR);
        assert_eq!(mem[reg::EEPROM_BACKUP as usize], bit::BSM_LEVEL_SWITCHING);
        assert_eq!(mem[reg::CTRL2 as usize] & bit::TWELVE_24, 0);
        assert_eq!(mem[reg::HOURS as usize], 0x13);
        // update command issued, auto-refresh re-enabled afterwards
        assert_eq!(mem[reg::EECMD as usize], cmd::UPDATE);
        assert_eq!(mem[reg::CTRL1 as usize] & bit::EERD, 0);
    }

    #[test]
    fn begin_skips_eeprom_commit_when_nothing_changes() {
        let mut bus = rtc_bus();
        bus.set_mem(RTC_ADDR, reg::EEPROM_BACKUP as usize, &[bit::BSM_LEVEL_SWITCHING]);

        let mut rtc = Rv3028::new();
        rtc.begin(bus, ClockConfig::default()).unwrap();

        let bus = rtc.release().unwrap();
        let touched_eecmd = bus.log().iter().any(|t| {
            matches!(t, Transfer::Write { data, .. } if data.first() == Some(&reg::EECMD))
        });
        assert!(!touched_eecmd);
    }

    #[test]
    fn begin_reports_missing_device() {
        let mut rtc = Rv3028::new();
        let err = rtc.begin(MockI2c::new(), ClockConfig::default()).unwrap_err();
        assert_eq!(
            err,
            DeviceError::Transport(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
        );
    }

    #[test]
    fn begin_rejects_foreign_chip_at_rtc_address() {
        let mut bus = rtc_bus();
        bus.set_mem(RTC_ADDR, reg::ID as usize, &[0x00]);
        bus.set_mem(RTC_ADDR, reg::EEPROM_BACKUP as usize, &[bit::TCE]);

        let mut rtc = Rv3028::new();
        assert_eq!(rtc.begin(bus, ClockConfig::default()), Err(DeviceError::Rejected));

        // nothing configured on the wrong chip
        let bus = rtc.release().unwrap();
        assert_eq!(bus.mem(RTC_ADDR)[reg::EEPROM_BACKUP as usize], bit::TCE);
        assert_eq!(
            bus.log(),
            &[
                Transfer::Write { addr: RTC_ADDR, data: std::vec![reg::ID] },
                Transfer::Read { addr: RTC_ADDR, len: 1 },
            ]
        );
    }

    #[test]
    fn begin_accepts_any_silicon_revision() {
        let mut bus = rtc_bus();
        bus.set_mem(RTC_ADDR, reg::ID as usize, &[0x3F]);
        let mut rtc = Rv3028::new();
        assert_eq!(rtc.begin(bus, ClockConfig::default()), Ok(()));
    }

    #[test]
    fn set_time_is_one_burst_write() {
        let mut rtc = Rv3028::new();
        rtc.begin(rtc_bus(), ClockConfig::default()).unwrap();
        let mut bus = rtc.release().unwrap();
        bus.clear_log();

        let mut rtc = Rv3028::new();
        rtc.i2c = Some(bus);
        rtc.set_time(&noon_2023()).unwrap();

        let bus = rtc.release().unwrap();
        assert_eq!(
            bus.log(),
            &[Transfer::Write {
                addr: RTC_ADDR,
                data: std::vec![0x00, 0x30, 0x15, 0x12, 3, 0x25, 0x01, 0x23],
            }]
        );
    }

    #[test]
    fn set_time_in_twelve_hour_mode() {
        let config = ClockConfig {
            use_24_hour: false,
            ..ClockConfig::default()
        };
        let mut rtc = Rv3028::new();
        rtc.begin(rtc_bus(), config).unwrap();
        assert!(rtc.is_12_hour());

        let mut t = noon_2023();
        t.hours = 15;
        rtc.set_time(&t).unwrap();
        assert_eq!(rtc.time().unwrap(), t);

        let bus = rtc.release().unwrap();
        assert_eq!(bus.mem(RTC_ADDR)[reg::HOURS as usize], 0x03 | bit::PM);
    }

    #[test]
    fn set_time_rejects_out_of_range_fields() {
        let mut rtc = Rv3028::new();
        rtc.begin(rtc_bus(), ClockConfig::default()).unwrap();

        let mut t = noon_2023();
        t.month = 13;
        assert_eq!(rtc.set_time(&t), Err(DeviceError::Rejected));

        let mut t = noon_2023();
        t.year = 2100;
        assert_eq!(rtc.set_time(&t), Err(DeviceError::Rejected));

        let mut t = noon_2023();
        t.day = 0;
        assert_eq!(rtc.set_time(&t), Err(DeviceError::Rejected));
    }

    #[test]
    fn set_time_before_begin() {
        let mut rtc: Rv3028<MockI2c> = Rv3028::new();
        assert_eq!(rtc.set_time(&noon_2023()), Err(DeviceError::NotInitialized));
    }

    #[test]
    fn reset_block_clears_flags_and_disables_sources() {
        let mut bus = rtc_bus();
        bus.set_mem(RTC_ADDR, reg::STATUS as usize, &[bit::AF | bit::TF | bit::UF | bit::CLKF]);
        bus.set_mem(RTC_ADDR, reg::CTRL1 as usize, &[bit::TE]);
        bus.set_mem(RTC_ADDR, reg::CTRL2 as usize, &[bit::AIE | bit::TIE | bit::UIE]);
        bus.set_mem(RTC_ADDR, reg::EEPROM_CLKOUT as usize, &[bit::CLKOE | 0x03]);

        let mut rtc = Rv3028::new();
        rtc.begin(bus, ClockConfig::default()).unwrap();
        rtc.disable_alarm_interrupt().unwrap();
        rtc.clear_alarm_interrupt_flag().unwrap();
        rtc.disable_timer().unwrap();
        rtc.disable_timer_interrupt().unwrap();
        rtc.clear_timer_interrupt_flag().unwrap();
        rtc.disable_periodic_update_interrupt().unwrap();
        rtc.clear_periodic_update_interrupt_flag().unwrap();
        rtc.disable_clock_out().unwrap();
        rtc.clear_clock_output_interrupt_flag().unwrap();
        rtc.reset().unwrap();

        let bus = rtc.release().unwrap();
        let mem = bus.mem(RTC_ADDR);
        assert_eq!(mem[reg::STATUS as usize], 0);
        assert_eq!(mem[reg::CTRL1 as usize] & bit::TE, 0);
        assert_eq!(mem[reg::CTRL2 as usize] & (bit::AIE | bit::TIE | bit::UIE), 0);
        assert_eq!(mem[reg::CTRL2 as usize] & bit::RESET, bit::RESET);
        assert_eq!(mem[reg::EEPROM_CLKOUT as usize], 0x03);
    }

    #[test]
    fn clear_interrupts_zeroes_status() {
        let mut bus = rtc_bus();
        bus.set_mem(RTC_ADDR, reg::STATUS as usize, &[0xFF]);
        let mut rtc = Rv3028::new();
        rtc.i2c = Some(bus);
        rtc.clear_interrupts().unwrap();
        assert_eq!(rtc.release().unwrap().mem(RTC_ADDR)[reg::STATUS as usize], 0);
    }
}
