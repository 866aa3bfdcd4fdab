//! Debounce windows for the periodic digests.

use crate::db::{DbError, EpochMillis, StateStore, LAST_DISCORD_REPORT_KEY, LAST_EMAIL_SENT_KEY};
use std::time::Duration;

/// A named "last sent" instant persisted in the state store.
#[derive(Debug, Clone, Copy)]
pub struct DebounceTimer {
    key: &'static str,
    interval: Duration,
}

impl DebounceTimer {
    pub fn new(key: &'static str, interval: Duration) -> Self {
        Self { key, interval }
    }

    pub fn email(interval: Duration) -> Self {
        Self::new(LAST_EMAIL_SENT_KEY, interval)
    }

    pub fn discord(interval: Duration) -> Self {
        Self::new(LAST_DISCORD_REPORT_KEY, interval)
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Last recorded send; zero if never sent.
    pub fn last_sent(&self, store: &dyn StateStore) -> Result<EpochMillis, DbError> {
        let value = store.get(self.key)?;
        Ok(EpochMillis::from_stored(value.as_deref()))
    }

    /// Whether at least one full interval has passed since the last send.
    pub fn is_due(&self, store: &dyn StateStore, now: EpochMillis) -> Result<bool, DbError> {
        let last = self.last_sent(store)?;
        let interval_ms = i64::try_from(self.interval.as_millis()).unwrap_or(i64::MAX);
        Ok(last.elapsed_until(now) >= interval_ms)
    }

    pub fn mark_sent(&self, store: &dyn StateStore, now: EpochMillis) -> Result<(), DbError> {
        store.put(self.key, &now.to_stored())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    #[test]
    fn test_absent_timer_is_due() {
        let store = Store::in_memory().unwrap();
        let timer = DebounceTimer::email(Duration::from_secs(3600));
        assert_eq!(timer.last_sent(&store).unwrap(), EpochMillis(0));
        assert!(timer.is_due(&store, EpochMillis(1_700_000_000_000)).unwrap());
    }

    #[test]
    fn test_window_boundary() {
        let store = Store::in_memory().unwrap();
        let timer = DebounceTimer::email(Duration::from_secs(3600));
        let now = EpochMillis(1_700_000_000_000);

        timer.mark_sent(&store, EpochMillis(now.0 - HOUR_MS - 1)).unwrap();
        assert!(timer.is_due(&store, now).unwrap());

        timer.mark_sent(&store, EpochMillis(now.0 - HOUR_MS)).unwrap();
        assert!(timer.is_due(&store, now).unwrap());

        timer.mark_sent(&store, EpochMillis(now.0 - HOUR_MS + 1)).unwrap();
        assert!(!timer.is_due(&store, now).unwrap());
    }

    #[test]
    fn test_timers_are_independent() {
        let store = Store::in_memory().unwrap();
        let email = DebounceTimer::email(Duration::from_secs(3600));
        let discord = DebounceTimer::discord(Duration::from_secs(300));
        let now = EpochMillis(10 * HOUR_MS);

        email.mark_sent(&store, now).unwrap();
        assert!(!email.is_due(&store, now).unwrap());
        assert!(discord.is_due(&store, now).unwrap());
        assert_eq!(store.get("lastEmailSentTime").unwrap().as_deref(), Some("36000000"));
    }
}
