// RTC module front-end: startup sequencing, host time sync, battery check
//
// Startup: bus -> ADC -> EEPROMs -> RTC begin -> RTC defaults -> time sync.
// A failed RTC begin aborts the sequence and is the only way initialize
// fails; the default-state block and the time sync run only after a
// successful begin, and their failures are logged, not returned.
//
// Time sync and battery reads are independent of each other and may be
// called any number of times after initialize. Nothing here locks the
// bus; wrap the whole module (or use CriticalSectionI2c) when more than
// one context can reach it.

use log::{debug, info, warn};

use crate::board::{Addresses, BATTERY_LOW_THRESHOLD_MV, REF_VOLTAGE_MV};
use crate::drivers::eeprom::Eeprom24x;
use crate::drivers::mcp3021::Mcp3021;
use crate::drivers::rv3028::Rv3028;
use crate::drivers::{AnalogSampler, BusTransport, ClockConfig, ClockDevice, PersistentStore};
use crate::error::{ConfigError, DeviceError, Error};
use crate::time::{ClockTime, HostClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryStatus {
    Healthy,
    Low,
}

impl BatteryStatus {
    /// Fixed threshold, no hysteresis: exactly 2500 mV is `Low`.
    pub const fn classify(millivolts: u16) -> Self {
        if millivolts > BATTERY_LOW_THRESHOLD_MV {
            BatteryStatus::Healthy
        } else {
            BatteryStatus::Low
        }
    }

    pub const fn is_healthy(self) -> bool {
        matches!(self, BatteryStatus::Healthy)
    }
}

/// What `initialize` did besides bringing the RTC up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    /// Host time was pushed into the RTC.
    pub time_synced: bool,
}

pub struct RtcModule<C, S, A> {
    clock: C,
    eeprom0: S,
    eeprom1: S,
    adc: A,
    addresses: Addresses,
    ref_voltage_mv: u16,
    last_raw: Option<u16>,
}

impl<D> RtcModule<Rv3028<D>, Eeprom24x<D>, Mcp3021<D>> {
    pub fn new(addresses: Addresses) -> Self {
        Self {
            clock: Rv3028::new(),
            eeprom0: Eeprom24x::new(addresses.eeprom0()),
            eeprom1: Eeprom24x::new(addresses.eeprom1()),
            adc: Mcp3021::new(addresses.adc()),
            addresses,
            ref_voltage_mv: REF_VOLTAGE_MV,
            last_raw: None,
        }
    }
}

impl<D> Default for RtcModule<Rv3028<D>, Eeprom24x<D>, Mcp3021<D>> {
    fn default() -> Self {
        Self::new(Addresses::default())
    }
}

impl<C, S, A> RtcModule<C, S, A>
where
    C: ClockDevice,
    S: PersistentStore,
    A: AnalogSampler,
{
    /// Assemble a module from already-constructed parts. Addresses are
    /// taken from the parts and checked like [`Addresses::new`].
    pub fn from_parts(clock: C, eeprom0: S, eeprom1: S, adc: A) -> Result<Self, ConfigError> {
        let addresses = Addresses::new(eeprom0.address(), eeprom1.address(), adc.address())?;
        Ok(Self {
            clock,
            eeprom0,
            eeprom1,
            adc,
            addresses,
            ref_voltage_mv: REF_VOLTAGE_MV,
            last_raw: None,
        })
    }

    /// Bring the bus and all peripherals up.
    ///
    /// `bus` is borrowed; every peripheral receives its own handle onto
    /// it. Fails if and only if the RTC does not come up. On success the
    /// RTC interrupts, timer and clock output are disabled, the chip is
    /// reset and the host time is written to it.
    pub fn initialize<B, H>(
        &mut self,
        bus: &mut B,
        config: ClockConfig,
        host: &H,
    ) -> Result<InitReport, Error>
    where
        B: BusTransport,
        C: ClockDevice<Device = B::Device>,
        S: PersistentStore<Device = B::Device>,
        A: AnalogSampler<Device = B::Device>,
        H: HostClock,
    {
        bus.start();

        self.adc.init(bus.device());
        self.eeprom0.attach(bus.device());
        self.eeprom1.attach(bus.device());

        self.clock.begin(bus.device(), config)?;

        self.reset_clock_defaults();

        let time_synced = match self.sync_local_time_to_clock(host) {
            Ok(()) => true,
            Err(e) => {
                warn!("[MOD] time sync during init failed: {}", e);
                false
            }
        };

        info!("[MOD] ready (time synced: {})", time_synced);
        Ok(InitReport { time_synced })
    }

    /// Push the host's wall-clock time into the RTC.
    ///
    /// Nothing is written when the host clock is unset. A failed write
    /// leaves the RTC in whatever state the driver left it.
    pub fn sync_local_time_to_clock<H: HostClock>(&mut self, host: &H) -> Result<(), Error> {
        let Some(now) = host.local_time() else {
            return Err(Error::HostTimeUnavailable);
        };

        let time = ClockTime::from(&now);
        self.clock.set_time(&time)?;
        debug!(
            "[MOD] RTC set to {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            time.year, time.month, time.day, time.hours, time.minutes, time.seconds
        );
        Ok(())
    }

    /// Sample the backup battery once, in millivolts.
    pub fn read_battery_voltage_mv(&mut self) -> u16 {
        let raw = self.adc.read();
        self.last_raw = Some(raw);
        self.adc.to_voltage(raw, self.ref_voltage_mv)
    }

    pub fn read_battery_status(&mut self) -> BatteryStatus {
        BatteryStatus::classify(self.read_battery_voltage_mv())
    }

    /// Raw code behind the most recent battery reading.
    pub fn last_raw_sample(&self) -> Option<u16> {
        self.last_raw
    }

    pub fn reference_voltage_mv(&self) -> u16 {
        self.ref_voltage_mv
    }

    pub fn addresses(&self) -> Addresses {
        self.addresses
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn eeprom0(&self) -> &S {
        &self.eeprom0
    }

    pub fn eeprom0_mut(&mut self) -> &mut S {
        &mut self.eeprom0
    }

    pub fn eeprom1(&self) -> &S {
        &self.eeprom1
    }

    pub fn eeprom1_mut(&mut self) -> &mut S {
        &mut self.eeprom1
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }

    // order matters: flags are cleared after their sources are disabled
    fn reset_clock_defaults(&mut self) {
        let steps: [(&str, fn(&mut C) -> Result<(), DeviceError>); 11] = [
            ("clear interrupts", C::clear_interrupts),
            ("disable alarm interrupt", C::disable_alarm_interrupt),
            ("clear alarm flag", C::clear_alarm_interrupt_flag),
            ("disable timer", C::disable_timer),
            ("disable timer interrupt", C::disable_timer_interrupt),
            ("clear timer flag", C::clear_timer_interrupt_flag),
            ("disable update interrupt", C::disable_periodic_update_interrupt),
            ("clear update flag", C::clear_periodic_update_interrupt_flag),
            ("disable clock out", C::disable_clock_out),
            ("clear clock out flag", C::clear_clock_output_interrupt_flag),
            ("reset", C::reset),
        ];

        for (name, step) in steps {
            if let Err(e) = step(&mut self.clock) {
                warn!("[MOD] RTC {} failed: {}", name, e);
            }
        }
    }
}
