//! `pincer daemon` — heartbeat and cron services until Ctrl-C.

use std::sync::Arc;

use pincer_agent::{CronService, HeartbeatService, SessionManager};
use pincer_config::AppConfig;
use tracing::info;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let heartbeat_enabled = config.heartbeat.enabled;

    // Scheduled turns reach the user through stdout.
    let manager = Arc::new(
        SessionManager::new(config).with_notify(Arc::new(|text: &str| println!("{text}"))),
    );

    if heartbeat_enabled {
        tokio::spawn(HeartbeatService::new(manager.clone()).run());
    } else {
        info!("Heartbeat disabled in config");
    }
    tokio::spawn(CronService::new(manager.clone()).run());

    println!("Pincer daemon running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    println!("\nShutting down.");
    Ok(())
}
