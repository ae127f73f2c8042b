use anyhow::{bail, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

mod aggregate;
mod collector;
mod config;
mod discord;
mod error;
mod format;
mod posthog;
mod report;
mod trend;
mod types;

use collector::MetricsCollector;
use config::load_config;
use discord::{Delivery, DiscordClient};
use format::format_digest;
use posthog::{MetricsSource, PostHogClient};
use report::build_report;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("starting PostHog daily digest");

    let cfg = load_config()?;
    let posthog = PostHogClient::new(&cfg)?;

    let projects = posthog.list_projects().await?;
    if projects.is_empty() {
        bail!("no projects accessible with this credential");
    }
    info!("discovered {} projects", projects.len());

    let now = Utc::now();
    let collector = MetricsCollector::new(Arc::new(posthog));
    let outcomes = collector.collect(&projects, now).await;

    let report = build_report(&projects, outcomes, now);
    if report.projects.is_empty() {
        bail!("all {} project fetches failed, nothing to report", projects.len());
    }
    if report.omitted > 0 {
        warn!("{} project(s) omitted from digest due to fetch errors", report.omitted);
    }

    let message = format_digest(&report);
    info!("formatted digest ({} chars)", message.len());

    let discord = DiscordClient::new(&cfg.discord_bot_token)?;
    discord.send(cfg.discord_user_id, &message).await?;
    info!("digest sent successfully");

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
