//! Persisted record types.

use serde::{Deserialize, Serialize};

/// Store key of the last email digest instant.
pub const LAST_EMAIL_SENT_KEY: &str = "lastEmailSentTime";
/// Store key of the last chat digest instant.
pub const LAST_DISCORD_REPORT_KEY: &str = "lastDiscordReportTime";

/// A down observation, written once per non-success HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub website: String,
    pub status: String,
    pub status_code: u16,
    pub timestamp: String,
}

impl LogEntry {
    pub fn down(website: &str, status_code: u16, timestamp: &str) -> Self {
        Self {
            website: website.to_string(),
            status: "down".to_string(),
            status_code,
            timestamp: timestamp.to_string(),
        }
    }

    /// Unique per observation: `log:<timestamp>:<website>`.
    pub fn key(&self) -> String {
        format!("log:{}:{}", self.timestamp, self.website)
    }
}

/// Milliseconds since the Unix epoch, as stored for debounce timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct EpochMillis(pub i64);

impl EpochMillis {
    /// Parse a stored timer value. Absent or malformed values become zero.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some(raw) => match raw.trim().parse() {
                Ok(ms) => EpochMillis(ms),
                Err(_) => {
                    tracing::warn!("Ignoring malformed timer value {:?}", raw);
                    EpochMillis(0)
                }
            },
            None => EpochMillis(0),
        }
    }

    pub fn to_stored(self) -> String {
        self.0.to_string()
    }

    /// Milliseconds elapsed from `self` to `later`.
    pub fn elapsed_until(self, later: EpochMillis) -> i64 {
        later.0.saturating_sub(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_json_shape() {
        let entry = LogEntry::down("https://example.com/", 503, "01/02/2024, 03:04:05 PM");
        let json: serde_json::Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["website"], "https://example.com/");
        assert_eq!(json["status"], "down");
        assert_eq!(json["statusCode"], 503);
        assert_eq!(
            entry.key(),
            "log:01/02/2024, 03:04:05 PM:https://example.com/"
        );
    }

    #[test]
    fn test_epoch_millis_defaults_to_zero() {
        assert_eq!(EpochMillis::from_stored(None), EpochMillis(0));
        assert_eq!(EpochMillis::from_stored(Some("not-a-number")), EpochMillis(0));
        assert_eq!(
            EpochMillis::from_stored(Some("1700000000000")),
            EpochMillis(1_700_000_000_000)
        );
        assert_eq!(EpochMillis(10).elapsed_until(EpochMillis(25)), 15);
    }
}
