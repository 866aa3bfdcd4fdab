//! Time source and display formatting.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Format an instant as `MM/DD/YYYY, hh:mm:ss AM` in the given timezone.
///
/// Every log entry, report line and message subject uses this one format.
pub fn format_timestamp(instant: DateTime<Utc>, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .format("%m/%d/%Y, %I:%M:%S %p")
        .to_string()
}
