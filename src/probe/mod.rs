//! Probe module for endpoint availability checks.
//!
//! One probe runs up to `max_retries` HTTP attempts against a single
//! endpoint with exponential backoff between attempts.

mod http;

pub use http::*;

use crate::clock::{format_timestamp, Clock};
use crate::db::{save_log_entry, LogEntry, StateStore};
use crate::notify::Notifier;

use async_trait::async_trait;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    #[error("network error: {message}")]
    Network {
        message: String,
        /// Full error chain, for the report's diagnostic line
        detail: String,
    },
}

/// Issues a single GET and reports the response status code.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn get(&self, url: &str) -> Result<u16, ProbeError>;
}

/// How one attempt turned out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Up,
    /// 404 or 503: fires the immediate alert path
    CriticalDown(u16),
    /// Any other non-success status
    SoftError(u16),
    TransportError(String),
}

impl Classification {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Classification::Up,
            404 | 503 => Classification::CriticalDown(status),
            other => Classification::SoftError(other),
        }
    }
}

/// Final state of an endpoint after its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalStatus {
    Up,
    DownWithCode(u16),
    TransportError(String),
}

/// A single attempt, as seen in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub timestamp: String,
    pub classification: Classification,
}

/// Result of probing one endpoint during one tick.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub endpoint: String,
    pub final_status: FinalStatus,
    pub attempts: u32,
    /// Formatted instant of the last attempt
    pub timestamp: String,
    pub observations: Vec<Observation>,
    /// Detail of the most recent transport failure, if any occurred
    pub error_detail: Option<String>,
}

impl ProbeOutcome {
    /// Outcome for a probe that never finished, e.g. a panicked task.
    pub fn aborted(endpoint: &str, message: &str, timestamp: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            final_status: FinalStatus::TransportError(message.to_string()),
            attempts: 0,
            timestamp: timestamp.to_string(),
            observations: vec![Observation {
                timestamp: timestamp.to_string(),
                classification: Classification::TransportError(message.to_string()),
            }],
            error_detail: None,
        }
    }

    /// True if any attempt saw a critical status, or the endpoint ended unreachable.
    pub fn needs_alert(&self) -> bool {
        matches!(self.final_status, FinalStatus::TransportError(_))
            || self
                .observations
                .iter()
                .any(|o| matches!(o.classification, Classification::CriticalDown(_)))
    }

    pub fn is_up(&self) -> bool {
        self.final_status == FinalStatus::Up
    }
}

/// Attempt count and backoff curve for a probe.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub exponent: u32,
}

impl RetryPolicy {
    /// Wait between attempt `attempt` and `attempt + 1` (zero-based):
    /// `base_delay * exponent^attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.exponent.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Runs probes and records their side effects.
pub struct Prober {
    http: Arc<dyn HttpProbe>,
    store: Arc<dyn StateStore>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    policy: RetryPolicy,
}

impl Prober {
    pub fn new(
        http: Arc<dyn HttpProbe>,
        store: Arc<dyn StateStore>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
        timezone: Tz,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            store,
            notifier,
            clock,
            timezone,
            policy,
        }
    }

    /// Probe one endpoint until it answers successfully or attempts run out.
    ///
    /// Never fails: exhausted retries yield the last observed state.
    pub async fn probe(&self, endpoint: &str) -> ProbeOutcome {
        let max_retries = self.policy.max_retries.max(1);
        let mut observations = Vec::new();
        let mut error_detail = None;
        let mut attempts = 0;

        for attempt in 0..max_retries {
            attempts += 1;
            let result = self.http.get(endpoint).await;
            let timestamp = format_timestamp(self.clock.now(), self.timezone);

            let classification = match result {
                Ok(status) => Classification::from_status(status),
                Err(ProbeError::Network { message, detail }) => {
                    error_detail = Some(detail);
                    Classification::TransportError(message)
                }
            };

            self.record(endpoint, &timestamp, &classification).await;

            let up = classification == Classification::Up;
            observations.push(Observation {
                timestamp,
                classification,
            });

            if up {
                break;
            }

            if attempt + 1 < max_retries {
                let delay = self.policy.delay_after(attempt);
                tracing::debug!("Retrying {} in {}ms", endpoint, delay.as_millis());
                tokio::time::sleep(delay).await;
            }
        }

        let (final_status, timestamp) = match observations.last() {
            Some(last) => {
                let status = match &last.classification {
                    Classification::Up => FinalStatus::Up,
                    Classification::CriticalDown(code) | Classification::SoftError(code) => {
                        FinalStatus::DownWithCode(*code)
                    }
                    Classification::TransportError(msg) => FinalStatus::TransportError(msg.clone()),
                };
                (status, last.timestamp.clone())
            }
            None => (
                FinalStatus::TransportError("no attempts made".to_string()),
                format_timestamp(self.clock.now(), self.timezone),
            ),
        };

        ProbeOutcome {
            endpoint: endpoint.to_string(),
            final_status,
            attempts,
            timestamp,
            observations,
            error_detail,
        }
    }

    /// Log one attempt and apply its side effects.
    ///
    /// Down states carrying a status code are persisted before any alert is sent;
    /// transport failures persist nothing.
    async fn record(&self, endpoint: &str, timestamp: &str, classification: &Classification) {
        match classification {
            Classification::Up => {
                tracing::info!("[{}] {} is up", timestamp, endpoint);
            }
            Classification::CriticalDown(code) => {
                self.save_log_entry(endpoint, *code, timestamp);
                tracing::warn!("[{}] {} is down. Status code: {}", timestamp, endpoint, code);
                if let Err(e) = self
                    .notifier
                    .send_website_down_email(endpoint, *code, timestamp)
                    .await
                {
                    tracing::error!("Error sending website down email for {}: {}", endpoint, e);
                }
            }
            Classification::SoftError(code) => {
                self.save_log_entry(endpoint, *code, timestamp);
                tracing::warn!(
                    "[{}] {} returned an error. Status code: {}",
                    timestamp,
                    endpoint,
                    code
                );
            }
            Classification::TransportError(message) => {
                tracing::error!("[{}] Error checking {} uptime: {}", timestamp, endpoint, message);
            }
        }
    }

    fn save_log_entry(&self, endpoint: &str, code: u16, timestamp: &str) {
        let entry = LogEntry::down(endpoint, code, timestamp);
        if let Err(e) = save_log_entry(self.store.as_ref(), &entry) {
            tracing::error!("Failed to save log entry for {}: {}", endpoint, e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::clock::testing::ManualClock;
    use crate::db::Store;
    use crate::notify::testing::RecordingMailer;
    use chrono::{TimeZone, Utc};
    use tokio::time::Instant;

    const URL: &str = "https://example.com/";

    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual <= expected + Duration::from_millis(5),
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(5000),
            exponent: 2,
        }
    }

    fn prober(
        http: Arc<ScriptedProbe>,
        store: Arc<Store>,
        notifier: Arc<Notifier>,
        max_retries: u32,
    ) -> Prober {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        Prober::new(
            http,
            store,
            notifier,
            Arc::new(clock),
            chrono_tz::Asia::Manila,
            policy(max_retries),
        )
    }

    #[test]
    fn test_classification() {
        assert_eq!(Classification::from_status(200), Classification::Up);
        assert_eq!(Classification::from_status(204), Classification::Up);
        assert_eq!(Classification::from_status(404), Classification::CriticalDown(404));
        assert_eq!(Classification::from_status(503), Classification::CriticalDown(503));
        assert_eq!(Classification::from_status(500), Classification::SoftError(500));
        assert_eq!(Classification::from_status(301), Classification::SoftError(301));
    }

    #[test]
    fn test_delay_after() {
        let p = policy(3);
        assert_eq!(p.delay_after(0), Duration::from_millis(5000));
        assert_eq!(p.delay_after(1), Duration::from_millis(10000));
        assert_eq!(p.delay_after(2), Duration::from_millis(20000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_uses_all_attempts() {
        let http = Arc::new(ScriptedProbe::new().script(URL, vec![Ok(500)]));
        let store = Arc::new(Store::in_memory().unwrap());
        let p = prober(http.clone(), store.clone(), Arc::new(Notifier::disabled()), 3);

        let outcome = p.probe(URL).await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.final_status, FinalStatus::DownWithCode(500));
        assert!(!outcome.needs_alert());
        assert_eq!(http.calls_for(URL).len(), 3);
        assert!(outcome
            .observations
            .iter()
            .all(|o| o.classification != Classification::Up));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_first_success() {
        let http = Arc::new(ScriptedProbe::new().script(URL, vec![Ok(500), Ok(200), Ok(500)]));
        let store = Arc::new(Store::in_memory().unwrap());
        let p = prober(http.clone(), store, Arc::new(Notifier::disabled()), 3);

        let outcome = p.probe(URL).await;

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.final_status, FinalStatus::Up);
        assert_eq!(http.calls_for(URL).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays() {
        let http = Arc::new(ScriptedProbe::new().script(URL, vec![Ok(503)]));
        let store = Arc::new(Store::in_memory().unwrap());
        let p = prober(http.clone(), store, Arc::new(Notifier::disabled()), 4);

        let start = Instant::now();
        p.probe(URL).await;
        let finished = Instant::now();

        let calls = http.calls_for(URL);
        assert_eq!(calls.len(), 4);
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_close(gaps[0], Duration::from_millis(5000));
        assert_close(gaps[1], Duration::from_millis(10000));
        assert_close(gaps[2], Duration::from_millis(20000));
        // No wait after the final attempt.
        assert_close(finished - start, Duration::from_millis(35000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_success() {
        let http = Arc::new(ScriptedProbe::new().script(URL, vec![Ok(200)]));
        let store = Arc::new(Store::in_memory().unwrap());
        let p = prober(http, store, Arc::new(Notifier::disabled()), 3);

        let start = Instant::now();
        let outcome = p.probe(URL).await;
        assert_eq!(outcome.attempts, 1);
        assert_close(Instant::now() - start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_entries_only_for_status_codes() {
        let down = "https://down.example/";
        let broken = "https://broken.example/";
        let unreachable = "https://unreachable.example/";
        let http = Arc::new(
            ScriptedProbe::new()
                .script(down, vec![Ok(404)])
                .script(broken, vec![Ok(500)])
                .script(unreachable, vec![Err(network_error("dns error"))]),
        );
        let store = Arc::new(Store::in_memory().unwrap());
        let p = prober(http, store.clone(), Arc::new(Notifier::disabled()), 1);

        let down_outcome = p.probe(down).await;
        p.probe(broken).await;
        let unreachable_outcome = p.probe(unreachable).await;

        let entries = store.get_log_entries().unwrap();
        let mut sites: Vec<&str> = entries.iter().map(|e| e.website.as_str()).collect();
        sites.sort();
        assert_eq!(sites, vec![broken, down]);

        assert!(down_outcome.needs_alert());
        assert!(unreachable_outcome.needs_alert());
        assert_eq!(
            unreachable_outcome.final_status,
            FinalStatus::TransportError("dns error".to_string())
        );
        assert_eq!(
            unreachable_outcome.error_detail.as_deref(),
            Some("dns error: connection refused")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_down_sends_immediate_email() {
        let http = Arc::new(ScriptedProbe::new().script(URL, vec![Ok(503), Ok(500), Ok(200)]));
        let store = Arc::new(Store::in_memory().unwrap());
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Arc::new(Notifier::new(
            Some(crate::notify::testing::email_notifier(mailer.clone())),
            None,
        ));
        let p = prober(http, store, notifier, 3);

        let outcome = p.probe(URL).await;
        assert!(outcome.is_up());
        assert!(outcome.needs_alert());

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, format!("[Uptime Monitor] Website Down: {}", URL));
        assert!(sent[0].body.contains("Status Code: 503"));
    }
}
