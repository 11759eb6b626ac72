//! Civil time for turn timestamps.

use anyhow::{Result, bail};
use time::macros::{offset, time};
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Source of "now" for annotation and export naming
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Civil timezone every timestamp is rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// GMT in winter, BST (+01:00) between the last Sundays of March and October
    London,
    Fixed(UtcOffset),
}

impl Zone {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        match value {
            "Europe/London" | "london" => return Ok(Zone::London),
            "UTC" | "utc" | "Z" => return Ok(Zone::Fixed(UtcOffset::UTC)),
            _ => {}
        }
        let format = time::macros::format_description!("[offset_hour sign:mandatory]:[offset_minute]");
        match UtcOffset::parse(value, &format) {
            Ok(offset) => Ok(Zone::Fixed(offset)),
            Err(_) => bail!("invalid timezone {value:?}: expected Europe/London, UTC or +HH:MM"),
        }
    }

    pub fn offset_at(&self, utc: OffsetDateTime) -> UtcOffset {
        match self {
            Zone::Fixed(offset) => *offset,
            Zone::London => {
                if in_british_summer_time(utc) {
                    offset!(+1)
                } else {
                    UtcOffset::UTC
                }
            }
        }
    }

    pub fn localize(&self, utc: OffsetDateTime) -> OffsetDateTime {
        utc.to_offset(self.offset_at(utc))
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Zone::London => f.write_str("Europe/London"),
            Zone::Fixed(offset) if offset.is_utc() => f.write_str("UTC"),
            Zone::Fixed(offset) => write!(
                f,
                "{}{:02}:{:02}",
                if offset.is_negative() { '-' } else { '+' },
                offset.whole_hours().unsigned_abs(),
                offset.minutes_past_hour().unsigned_abs()
            ),
        }
    }
}

fn last_sunday(year: i32, month: Month) -> Option<Date> {
    // March and October both have 31 days
    let last = Date::from_calendar_date(year, month, 31).ok()?;
    Some(last - Duration::days(last.weekday().number_days_from_sunday() as i64))
}

/// Summer time starts and ends at 01:00 UTC on the last Sunday of March/October
fn in_british_summer_time(utc: OffsetDateTime) -> bool {
    let utc = utc.to_offset(UtcOffset::UTC);
    let year = utc.year();
    let (Some(start), Some(end)) = (
        last_sunday(year, Month::March),
        last_sunday(year, Month::October),
    ) else {
        return false;
    };
    let start = PrimitiveDateTime::new(start, time!(01:00)).assume_utc();
    let end = PrimitiveDateTime::new(end, time!(01:00)).assume_utc();
    start <= utc && utc < end
}

/// Wall clock in a configured zone
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    zone: Zone,
}

impl SystemClock {
    pub fn new(zone: Zone) -> Self {
        Self { zone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        self.zone.localize(OffsetDateTime::now_utc())
    }
}
