// Host wall-clock time and the RTC's view of it
//
// The host hands out conventional broken-down time: month 0..=11 and
// year counted from 1900. The RTC wants month 1..=12 and an absolute
// year. ClockTime::from does that shift and nothing else; range checks
// belong to the clock driver. A shift that overflows saturates, which no
// driver accepts as a valid field.

/// Year offset of `LocalTime::year`.
pub const TM_YEAR_BASE: u16 = 1900;

/// Broken-down host time, `struct tm` conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalTime {
    pub sec: u8,
    pub min: u8,
    /// 0..=23
    pub hour: u8,
    /// days since Sunday, 0..=6
    pub wday: u8,
    /// 1..=31
    pub mday: u8,
    /// months since January, 0..=11
    pub mon: u8,
    /// years since 1900
    pub year: u16,
}

/// Field set written to the clock device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockTime {
    pub seconds: u8,
    pub minutes: u8,
    /// Always 24-hour here; the driver re-encodes for 12-hour mode.
    pub hours: u8,
    pub weekday: u8,
    pub day: u8,
    /// 1..=12
    pub month: u8,
    /// Absolute calendar year.
    pub year: u16,
}

impl From<&LocalTime> for ClockTime {
    fn from(t: &LocalTime) -> Self {
        Self {
            seconds: t.sec,
            minutes: t.min,
            hours: t.hour,
            weekday: t.wday,
            day: t.mday,
            month: t.mon.saturating_add(1),
            year: t.year.saturating_add(TM_YEAR_BASE),
        }
    }
}

/// Source of host wall-clock time.
///
/// Returns `None` when the host clock has never been set.
pub trait HostClock {
    fn local_time(&self) -> Option<LocalTime>;
}

impl<F> HostClock for F
where
    F: Fn() -> Option<LocalTime>,
{
    fn local_time(&self) -> Option<LocalTime> {
        self()
    }
}

#[cfg(feature = "std")]
pub use system::SystemHostClock;

#[cfg(feature = "std")]
mod system {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{HostClock, LocalTime, TM_YEAR_BASE};

    // anything earlier means the host never synced (NTP, user, ...)
    const MIN_VALID_YEAR: i64 = 2016;

    /// Host clock backed by `SystemTime`, reported in UTC.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemHostClock;

    impl HostClock for SystemHostClock {
        fn local_time(&self) -> Option<LocalTime> {
            let secs = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
            broken_down(secs as i64)
        }
    }

    pub(super) fn broken_down(unix_secs: i64) -> Option<LocalTime> {
        let days = unix_secs.div_euclid(86_400);
        let rem = unix_secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        if year < MIN_VALID_YEAR {
            return None;
        }

        Some(LocalTime {
            sec: (rem % 60) as u8,
            min: (rem / 60 % 60) as u8,
            hour: (rem / 3600) as u8,
            // 1970-01-01 was a Thursday
            wday: (days + 4).rem_euclid(7) as u8,
            mday: day as u8,
            mon: (month - 1) as u8,
            year: (year - TM_YEAR_BASE as i64) as u16,
        })
    }

    // days since 1970-01-01 -> (year, month 1..=12, day 1..=31)
    fn civil_from_days(days: i64) -> (i64, i64, i64) {
        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z.rem_euclid(146_097);
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
        (year, month, day)
    }
}
