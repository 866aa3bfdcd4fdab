//! Discord webhook and bot API delivery.

use super::NotifyError;
use crate::config::DiscordConfig;

use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct MessagePayload<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct CreateDmPayload<'a> {
    recipient_id: &'a str,
}

#[derive(Deserialize)]
struct DmChannel {
    id: String,
}

/// Bot credentials for direct messages.
#[derive(Debug, Clone)]
struct DiscordBot {
    token: String,
    user_id: String,
}

/// Posts to a channel webhook and, with a bot token, to one user's DMs.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: String,
    api_base: String,
    bot: Option<DiscordBot>,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("sitewatch/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let bot = match (&config.bot_token, &config.user_id) {
            (Some(token), Some(user_id)) => Some(DiscordBot {
                token: token.clone(),
                user_id: user_id.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            client,
            webhook_url: config.webhook_url.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot,
        })
    }

    pub fn has_bot(&self) -> bool {
        self.bot.is_some()
    }

    /// Post one message to the configured webhook.
    pub async fn post_webhook(&self, content: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&MessagePayload { content })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                target: "Discord webhook",
                status: status.as_u16(),
            });
        }

        tracing::info!("Message sent to Discord webhook successfully.");
        Ok(())
    }

    /// Open (or reuse) the DM channel with the configured user, then post into it.
    pub async fn send_direct_message(&self, content: &str) -> Result<(), NotifyError> {
        let bot = self.bot.as_ref().ok_or(NotifyError::Disabled("discord bot"))?;
        let auth = format!("Bot {}", bot.token);

        let response = self
            .client
            .post(format!("{}/users/@me/channels", self.api_base))
            .header(reqwest::header::AUTHORIZATION, &auth)
            .json(&CreateDmPayload {
                recipient_id: &bot.user_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status {
                target: "Discord DM channel",
                status: response.status().as_u16(),
            });
        }
        let channel: DmChannel = response.json().await?;

        let response = self
            .client
            .post(format!("{}/channels/{}/messages", self.api_base, channel.id))
            .header(reqwest::header::AUTHORIZATION, &auth)
            .json(&MessagePayload { content })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status {
                target: "Discord direct message",
                status: response.status().as_u16(),
            });
        }

        tracing::info!("Direct message sent to Discord user successfully.");
        Ok(())
    }
}
