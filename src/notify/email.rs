//! Email delivery over SMTP.

use super::NotifyError;
use crate::config::SmtpConfig;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

/// A plain-text email ready for a transport.
#[derive(Debug, Clone)]
pub struct Email {
    pub from: Mailbox,
    pub to: Mailbox,
    pub subject: String,
    pub body: String,
}

/// Outbound email transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), NotifyError>;
}

/// SMTP relay transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.relay)?
            .credentials(creds)
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(email.from)
            .to(email.to)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Builds the monitor's emails and hands them to a `Mailer`.
pub struct EmailNotifier {
    mailer: Arc<dyn Mailer>,
    sender: Mailbox,
    recipient: Mailbox,
    subject_prefix: String,
}

impl EmailNotifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        sender_name: &str,
        sender_email: &str,
        recipient_email: &str,
        subject_prefix: &str,
    ) -> Result<Self, NotifyError> {
        Ok(Self {
            mailer,
            sender: Mailbox::new(Some(sender_name.to_string()), sender_email.parse::<Address>()?),
            recipient: Mailbox::new(None, recipient_email.parse::<Address>()?),
            subject_prefix: subject_prefix.to_string(),
        })
    }

    fn email(&self, subject: String, body: String) -> Email {
        Email {
            from: self.sender.clone(),
            to: self.recipient.clone(),
            subject,
            body,
        }
    }

    /// Full digest of every endpoint.
    pub async fn send_status_report(&self, report: &str, scheduled: &str) -> Result<(), NotifyError> {
        let email = self.email(
            format!(
                "{} Website Uptime Status Report - {}",
                self.subject_prefix, scheduled
            ),
            format!("Here is the website uptime status report:\n\n{}", report),
        );
        self.mailer.send(email).await?;
        tracing::info!("Status report email sent successfully.");
        Ok(())
    }

    /// Immediate alert for one endpoint answering 404 or 503.
    pub async fn send_website_down(
        &self,
        website: &str,
        status_code: u16,
        timestamp: &str,
    ) -> Result<(), NotifyError> {
        let email = self.email(
            format!("{} Website Down: {}", self.subject_prefix, website),
            format!(
                "The website {} is down.\n\nStatus Code: {}\nTimestamp: {}",
                website, status_code, timestamp
            ),
        );
        self.mailer.send(email).await?;
        tracing::info!("Website down email sent successfully for {}.", website);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::{email_notifier, RecordingMailer};

    #[test]
    fn test_rejects_bad_address() {
        let result = EmailNotifier::new(
            Arc::new(RecordingMailer::default()),
            "Monitor",
            "not an address",
            "ops@example.com",
            "[x]",
        );
        assert!(matches!(result, Err(NotifyError::Address(_))));
    }

    #[tokio::test]
    async fn test_website_down_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = email_notifier(mailer.clone());

        notifier
            .send_website_down("https://a.example/", 404, "01/01/2024, 08:00:00 AM")
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent[0].subject, "[Uptime Monitor] Website Down: https://a.example/");
        assert_eq!(
            sent[0].body,
            "The website https://a.example/ is down.\n\nStatus Code: 404\nTimestamp: 01/01/2024, 08:00:00 AM"
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_returned() {
        let notifier = email_notifier(Arc::new(RecordingMailer::failing()));
        assert!(notifier.send_status_report("r", "t").await.is_err());
    }
}
