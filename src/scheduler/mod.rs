//! Scheduler module: one tick probes every endpoint and decides which
//! notifications to send.

mod debounce;
mod report;

pub use debounce::*;
pub use report::*;

use crate::clock::{format_timestamp, Clock};
use crate::config::MonitorConfig;
use crate::db::{EpochMillis, StateStore};
use crate::notify::Notifier;
use crate::probe::{HttpProbe, ProbeOutcome, Prober, RetryPolicy};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// What a tick did, for logging and inspection.
#[derive(Debug)]
pub struct TickSummary {
    pub outcomes: Vec<ProbeOutcome>,
    pub report: StatusReport,
    pub email_sent: bool,
    pub discord_sent: bool,
    pub emergency_sent: bool,
}

/// The check-and-notify engine.
pub struct Monitor {
    config: Arc<MonitorConfig>,
    store: Arc<dyn StateStore>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
    prober: Arc<Prober>,
}

impl Monitor {
    pub fn new(
        config: Arc<MonitorConfig>,
        http: Arc<dyn HttpProbe>,
        store: Arc<dyn StateStore>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.retry_delay_base,
            exponent: config.retry_delay_exponent,
        };
        let prober = Arc::new(Prober::new(
            http,
            store.clone(),
            notifier.clone(),
            clock.clone(),
            config.timezone,
            policy,
        ));

        Self {
            config,
            store,
            notifier,
            clock,
            prober,
        }
    }

    /// Run ticks on a fixed period until the task is dropped.
    ///
    /// Ticks never overlap; a tick that overruns the period skips the missed firings.
    pub async fn run(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            "Starting monitor with {} websites, tick every {}s",
            self.config.websites.len(),
            period.as_secs()
        );

        loop {
            interval.tick().await;
            self.run_tick(self.clock.now()).await;
        }
    }

    /// One tick: probe everything, build the report, dispatch notifications.
    ///
    /// Never fails; every probe and dispatch error is logged where it happens.
    pub async fn run_tick(&self, scheduled: DateTime<Utc>) -> TickSummary {
        let scheduled_ts = format_timestamp(scheduled, self.config.timezone);
        tracing::info!("Tick scheduled at {}", scheduled_ts);

        let outcomes = self.probe_all().await;
        let report = StatusReport::from_outcomes(&outcomes);
        let has_down_websites = outcomes.iter().any(ProbeOutcome::needs_alert);

        let now = EpochMillis(self.clock.now().timestamp_millis());
        let email_sent = self.send_email_digest(&report, &scheduled_ts, now).await;
        let discord_sent = self.send_discord_digest(&report, &scheduled_ts, now).await;

        let emergency_sent = if has_down_websites || self.config.test_mode {
            self.send_emergency_alert(&report, &scheduled_ts).await
        } else {
            false
        };

        tracing::info!(
            up = outcomes.iter().filter(|o| o.is_up()).count(),
            total = outcomes.len(),
            email_sent,
            discord_sent,
            emergency_sent,
            "Tick complete"
        );

        TickSummary {
            outcomes,
            report,
            email_sent,
            discord_sent,
            emergency_sent,
        }
    }

    /// Probe all endpoints concurrently and collect outcomes in configured order.
    async fn probe_all(&self) -> Vec<ProbeOutcome> {
        let handles: Vec<_> = self
            .config
            .websites
            .iter()
            .map(|url| {
                let prober = self.prober.clone();
                let endpoint = url.clone();
                let handle = tokio::spawn(async move { prober.probe(&endpoint).await });
                (url.clone(), handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (url, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!("Probe task for {} failed: {}", url, e);
                    let timestamp = format_timestamp(self.clock.now(), self.config.timezone);
                    outcomes.push(ProbeOutcome::aborted(&url, &e.to_string(), &timestamp));
                }
            }
        }
        outcomes
    }

    async fn send_email_digest(&self, report: &StatusReport, scheduled: &str, now: EpochMillis) -> bool {
        if !self.notifier.has_email() {
            tracing::debug!("Email not configured, skipping status report");
            return false;
        }

        let timer = DebounceTimer::email(self.config.email_interval);
        if !self.is_due(&timer, now) {
            return false;
        }

        match self
            .notifier
            .send_status_report_email(report.as_str(), scheduled)
            .await
        {
            Ok(()) => {
                self.mark_sent(&timer, now);
                true
            }
            Err(e) => {
                tracing::error!("Error sending status report email: {}", e);
                false
            }
        }
    }

    async fn send_discord_digest(&self, report: &StatusReport, scheduled: &str, now: EpochMillis) -> bool {
        if !self.notifier.has_discord() {
            tracing::debug!("Discord not configured, skipping status report");
            return false;
        }

        let timer = DebounceTimer::discord(self.config.discord_report_interval);
        if !self.is_due(&timer, now) {
            return false;
        }

        match self
            .notifier
            .send_status_report_to_discord(report.as_str(), scheduled)
            .await
        {
            Ok(()) => {
                self.mark_sent(&timer, now);
                true
            }
            Err(e) => {
                tracing::error!("Error sending status report to Discord: {}", e);
                false
            }
        }
    }

    /// Not debounced: fires on every tick with a down endpoint.
    async fn send_emergency_alert(&self, report: &StatusReport, scheduled: &str) -> bool {
        let delivery = self
            .notifier
            .send_emergency_alert(report.as_str(), scheduled)
            .await;

        if let Err(e) = &delivery.webhook {
            tracing::error!("Error sending website down emergency message to Discord channel: {}", e);
        }
        match &delivery.direct_message {
            Some(Err(e)) => {
                tracing::error!("Error sending website down emergency message to Discord user: {}", e)
            }
            Some(Ok(())) | None => {}
        }

        delivery.webhook.is_ok() || matches!(delivery.direct_message, Some(Ok(())))
    }

    // The read-decide-write on a timer is not atomic; overlapping ticks from
    // duplicate triggers can both send.
    fn is_due(&self, timer: &DebounceTimer, now: EpochMillis) -> bool {
        match timer.is_due(self.store.as_ref(), now) {
            Ok(due) => due,
            Err(e) => {
                tracing::error!("Failed to read {}: {}", timer.key(), e);
                false
            }
        }
    }

    fn mark_sent(&self, timer: &DebounceTimer, now: EpochMillis) {
        if let Err(e) = timer.mark_sent(self.store.as_ref(), now) {
            tracing::error!("Failed to write {}: {}", timer.key(), e);
        }
    }
}
