//! Configuration module for sitewatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use chrono_tz::Tz;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors, fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// SMTP relay credentials for the email channel.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub relay: String,
    pub username: String,
    pub password: String,
}

/// Discord webhook and bot settings for the chat channel.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub webhook_url: String,
    /// Bot token and recipient user for direct messages; both are needed for DMs.
    pub bot_token: Option<String>,
    pub user_id: Option<String>,
    pub api_base: String,
}

/// Monitor configuration, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Endpoints probed on every tick, in report order
    pub websites: Vec<String>,
    /// Minimum time between email digests (default: 1 hour)
    pub email_interval: Duration,
    /// Minimum time between chat digests (default: 5 minutes)
    pub discord_report_interval: Duration,
    /// Attempts per endpoint per tick (default: 3)
    pub max_retries: u32,
    /// Delay before the second attempt (default: 5000ms)
    pub retry_delay_base: Duration,
    /// Growth factor of the delay between attempts (default: 2)
    pub retry_delay_exponent: u32,
    pub sender_name: String,
    pub sender_email: String,
    pub recipient_email: String,
    pub email_subject_prefix: String,
    /// Forces the emergency alert on every tick
    pub test_mode: bool,
    /// Display timezone for every timestamp (default: Asia/Manila)
    pub timezone: Tz,
    /// Path to the SQLite state file (default: "sitewatch.db")
    pub db_path: String,
    /// Period of the internal tick timer (default: 60s)
    pub tick_interval: Duration,
    /// Run a single tick and exit
    pub run_once: bool,
    pub smtp: Option<SmtpConfig>,
    pub discord: Option<DiscordConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            websites: Vec::new(),
            email_interval: Duration::from_secs(60 * 60),
            discord_report_interval: Duration::from_secs(5 * 60),
            max_retries: 3,
            retry_delay_base: Duration::from_millis(5000),
            retry_delay_exponent: 2,
            sender_name: "Website Uptime Monitor".to_string(),
            sender_email: String::new(),
            recipient_email: String::new(),
            email_subject_prefix: "[Uptime Monitor]".to_string(),
            test_mode: false,
            timezone: chrono_tz::Asia::Manila,
            db_path: "sitewatch.db".to_string(),
            tick_interval: Duration::from_secs(60),
            run_once: false,
            smtp: None,
            discord: None,
        }
    }
}

const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

impl MonitorConfig {
    /// Load configuration from the process environment.
    ///
    /// Every variable is prefixed with `SITEWATCH_`, e.g. `SITEWATCH_WEBSITES`
    /// (comma separated), `SITEWATCH_EMAIL_INTERVAL_SECS`, `SITEWATCH_TIMEZONE`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(format!("SITEWATCH_{}", key)).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(websites) = lookup("WEBSITES") {
            cfg.websites = websites
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "EMAIL_INTERVAL_SECS")? {
            cfg.email_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "DISCORD_REPORT_INTERVAL_SECS")? {
            cfg.discord_report_interval = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var(&lookup, "MAX_RETRIES")? {
            cfg.max_retries = retries;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "RETRY_DELAY_BASE_MS")? {
            cfg.retry_delay_base = Duration::from_millis(ms);
        }
        if let Some(exponent) = parse_var(&lookup, "RETRY_DELAY_EXPONENT")? {
            cfg.retry_delay_exponent = exponent;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TICK_INTERVAL_SECS")? {
            cfg.tick_interval = Duration::from_secs(secs);
        }

        if let Some(name) = lookup("SENDER_NAME") {
            cfg.sender_name = name;
        }
        if let Some(addr) = lookup("SENDER_EMAIL") {
            cfg.sender_email = addr;
        }
        if let Some(addr) = lookup("RECIPIENT_EMAIL") {
            cfg.recipient_email = addr;
        }
        if let Some(prefix) = lookup("EMAIL_SUBJECT_PREFIX") {
            cfg.email_subject_prefix = prefix;
        }
        if let Some(path) = lookup("DB_PATH") {
            cfg.db_path = path;
        }

        cfg.test_mode = parse_flag(&lookup, "TEST_MODE");
        cfg.run_once = parse_flag(&lookup, "RUN_ONCE");

        if let Some(tz) = lookup("TIMEZONE") {
            cfg.timezone = tz
                .parse::<Tz>()
                .map_err(|e| ConfigError::invalid("TIMEZONE", format!("{}", e)))?;
        }

        if let Some(relay) = lookup("SMTP_RELAY") {
            cfg.smtp = Some(SmtpConfig {
                relay,
                username: lookup("SMTP_USERNAME").unwrap_or_default(),
                password: lookup("SMTP_PASSWORD").unwrap_or_default(),
            });
        }

        if let Some(webhook_url) = lookup("DISCORD_WEBHOOK_URL") {
            cfg.discord = Some(DiscordConfig {
                webhook_url,
                bot_token: lookup("DISCORD_BOT_TOKEN"),
                user_id: lookup("DISCORD_USER_ID"),
                api_base: lookup("DISCORD_API_BASE")
                    .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE.to_string()),
            });
        }

        Ok(cfg)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.websites.is_empty() {
            return Err(ConfigError::invalid(
                "WEBSITES",
                "at least one website must be specified",
            ));
        }

        if self.max_retries == 0 {
            return Err(ConfigError::invalid("MAX_RETRIES", "must be at least 1"));
        }

        if self.retry_delay_exponent == 0 {
            return Err(ConfigError::invalid(
                "RETRY_DELAY_EXPONENT",
                "must be at least 1",
            ));
        }

        if self.tick_interval.is_zero() {
            return Err(ConfigError::invalid(
                "TICK_INTERVAL_SECS",
                "must be greater than 0",
            ));
        }

        if self.smtp.is_some() {
            if self.sender_email.parse::<lettre::Address>().is_err() {
                return Err(ConfigError::invalid(
                    "SENDER_EMAIL",
                    format!("'{}' is not an email address", self.sender_email),
                ));
            }
            if self.recipient_email.parse::<lettre::Address>().is_err() {
                return Err(ConfigError::invalid(
                    "RECIPIENT_EMAIL",
                    format!("'{}' is not an email address", self.recipient_email),
                ));
            }
        }

        Ok(())
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::invalid(name, e.to_string())),
        None => Ok(None),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    lookup(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}
