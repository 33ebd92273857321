/// Time-of-day windows for playlists.
/// Windows are written as "HH:MM" strings; "24:00" means end of day.
use chrono::{NaiveTime, Timelike};

use crate::error::RefreshError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// A parsed `[start, end)` window in minutes since midnight.
/// `end <= start` means the window wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: u32,
    pub end: u32,
}

impl TimeWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self, RefreshError> {
        Ok(Self {
            start: parse_minutes(start)?,
            end: parse_minutes(end)?,
        })
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        let minute = time.hour() * 60 + time.minute();
        if self.wraps_midnight() {
            minute >= self.start || minute < self.end
        } else {
            self.start <= minute && minute < self.end
        }
    }

    /// Window length in minutes; narrower windows win priority
    pub fn duration_minutes(&self) -> u32 {
        if self.wraps_midnight() {
            MINUTES_PER_DAY - self.start + self.end
        } else {
            self.end - self.start
        }
    }
}

/// Parse "HH:MM" into minutes since midnight. "24:00" is accepted.
pub fn parse_minutes(value: &str) -> Result<u32, RefreshError> {
    let invalid = || RefreshError::Configuration(format!("Invalid time of day: '{value}'"));

    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;

    if hours == 24 && minutes == 0 {
        return Ok(MINUTES_PER_DAY);
    }
    if hours >= 24 || minutes >= 60 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// Parse "HH:MM" into a clock time (used by scheduled refresh policies)
pub fn parse_clock_time(value: &str) -> Result<NaiveTime, RefreshError> {
    let minutes = parse_minutes(value)?;
    if minutes == MINUTES_PER_DAY {
        return Err(RefreshError::Configuration(format!(
            "Invalid clock time: '{value}'"
        )));
    }
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
        .ok_or_else(|| RefreshError::Configuration(format!("Invalid clock time: '{value}'")))
}
