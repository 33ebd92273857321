/// Time sources for the refresh loop. The clock yields an instant; the
/// device's configured zone turns it into the wall time playlists use.
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The host clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parse an IANA zone name, falling back to UTC
pub fn resolve_timezone(name: &str) -> Tz {
    name.parse::<Tz>().unwrap_or_else(|e| {
        warn!("Invalid timezone '{}', defaulting to UTC: {}", name, e);
        Tz::UTC
    })
}

/// Wall-clock time on the device for the given instant
pub fn device_time(instant: DateTime<Utc>, timezone: &str) -> NaiveDateTime {
    instant.with_timezone(&resolve_timezone(timezone)).naive_local()
}
