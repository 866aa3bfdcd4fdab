//! sitewatch - periodic website uptime monitor.
//!
//! Probes a fixed set of endpoints on every tick, keeps debounce state in
//! SQLite and notifies over email and Discord.

mod clock;
mod config;
mod db;
mod notify;
mod probe;
mod scheduler;

use clock::SystemClock;
use config::MonitorConfig;
use db::Store;
use notify::{DiscordNotifier, EmailNotifier, Notifier, SmtpMailer};
use probe::ReqwestProbe;
use scheduler::Monitor;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitewatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = MonitorConfig::load()?;
    cfg.validate()?;
    tracing::info!("Monitoring {} websites", cfg.websites.len());
    tracing::info!("Using database at {}", cfg.db_path);

    let store = Arc::new(Store::new(&cfg.db_path)?);
    let notifier = Arc::new(build_notifier(&cfg)?);
    let http = Arc::new(ReqwestProbe::new()?);

    let run_once = cfg.run_once;
    let period = cfg.tick_interval;
    let monitor = Monitor::new(Arc::new(cfg), http, store, notifier, Arc::new(SystemClock));

    if run_once {
        monitor.run_tick(chrono::Utc::now()).await;
        return Ok(());
    }

    tokio::select! {
        _ = monitor.run(period) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}

fn build_notifier(cfg: &MonitorConfig) -> Result<Notifier, notify::NotifyError> {
    let email = match &cfg.smtp {
        Some(smtp) => Some(EmailNotifier::new(
            Arc::new(SmtpMailer::new(smtp)?),
            &cfg.sender_name,
            &cfg.sender_email,
            &cfg.recipient_email,
            &cfg.email_subject_prefix,
        )?),
        None => {
            tracing::warn!("SITEWATCH_SMTP_RELAY not set, email notifications disabled");
            None
        }
    };

    let discord = match &cfg.discord {
        Some(discord) => {
            if discord.bot_token.is_none() || discord.user_id.is_none() {
                tracing::warn!("Discord bot token or user id not set, direct messages disabled");
            }
            Some(DiscordNotifier::new(discord)?)
        }
        None => {
            tracing::warn!("SITEWATCH_DISCORD_WEBHOOK_URL not set, Discord notifications disabled");
            None
        }
    };

    Ok(Notifier::new(email, discord))
}
