//! Notification delivery over email and Discord.
//!
//! Every sender is best-effort: callers get a `Result` to log, nothing is
//! queued or retried here.

mod discord;
mod email;

pub use discord::*;
pub use email::*;

use thiserror::Error;

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{target} responded with status {status}")]
    Status { target: &'static str, status: u16 },
    #[error("{0} channel is not configured")]
    Disabled(&'static str),
}

/// Body of the chat digest.
pub fn digest_content(report: &str, scheduled: &str) -> String {
    format!("Website Uptime Status Report - {}\n\n{}", scheduled, report)
}

/// Body of the emergency alert, sent to both the channel and the user.
pub fn emergency_content(report: &str, scheduled: &str) -> String {
    format!(
        "Emergency: One or more websites are down!\n\n{}",
        digest_content(report, scheduled)
    )
}

/// Outcome of the two independent emergency deliveries.
#[derive(Debug)]
pub struct EmergencyDelivery {
    pub webhook: Result<(), NotifyError>,
    /// `None` when no bot is configured for direct messages
    pub direct_message: Option<Result<(), NotifyError>>,
}

/// Fan-out point for all configured channels.
pub struct Notifier {
    email: Option<EmailNotifier>,
    discord: Option<DiscordNotifier>,
}

impl Notifier {
    pub fn new(email: Option<EmailNotifier>, discord: Option<DiscordNotifier>) -> Self {
        Self { email, discord }
    }

    /// A notifier with no channels; every send is skipped.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    pub fn has_email(&self) -> bool {
        self.email.is_some()
    }

    pub fn has_discord(&self) -> bool {
        self.discord.is_some()
    }

    pub async fn send_status_report_email(
        &self,
        report: &str,
        scheduled: &str,
    ) -> Result<(), NotifyError> {
        let email = self.email.as_ref().ok_or(NotifyError::Disabled("email"))?;
        email.send_status_report(report, scheduled).await
    }

    /// Single-endpoint alert; silently skipped when email is not configured.
    pub async fn send_website_down_email(
        &self,
        website: &str,
        status_code: u16,
        timestamp: &str,
    ) -> Result<(), NotifyError> {
        match &self.email {
            Some(email) => email.send_website_down(website, status_code, timestamp).await,
            None => {
                tracing::debug!("Email not configured, skipping down alert for {}", website);
                Ok(())
            }
        }
    }

    pub async fn send_status_report_to_discord(
        &self,
        report: &str,
        scheduled: &str,
    ) -> Result<(), NotifyError> {
        let discord = self
            .discord
            .as_ref()
            .ok_or(NotifyError::Disabled("discord"))?;
        discord
            .post_webhook(&digest_content(report, scheduled))
            .await
    }

    /// Post the emergency alert to the channel, then DM the configured user.
    ///
    /// The two deliveries are independent: a failed webhook post does not
    /// stop the direct message, and vice versa.
    pub async fn send_emergency_alert(&self, report: &str, scheduled: &str) -> EmergencyDelivery {
        let Some(discord) = &self.discord else {
            return EmergencyDelivery {
                webhook: Err(NotifyError::Disabled("discord")),
                direct_message: None,
            };
        };

        let content = emergency_content(report, scheduled);
        let webhook = discord.post_webhook(&content).await;
        let direct_message = if discord.has_bot() {
            Some(discord.send_direct_message(&content).await)
        } else {
            None
        };

        EmergencyDelivery {
            webhook,
            direct_message,
        }
    }
}
