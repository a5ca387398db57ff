//! Scheduled prompts: heartbeat and cron.
//!
//! Both services run agent turns against dedicated sessions. Failures are
//! logged and the schedule keeps going; a broken prompt must never take the
//! daemon down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::session::SessionManager;

const HEARTBEAT_FILE: &str = "HEARTBEAT.md";
const CRON_FILE: &str = "cron/jobs.json";

/// Periodically runs the contents of `workspace/HEARTBEAT.md` as a prompt
/// on the "heartbeat" session.
pub struct HeartbeatService {
    manager: Arc<SessionManager>,
    workspace: PathBuf,
    interval: Duration,
}

impl HeartbeatService {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        let config = manager.config();
        Self {
            workspace: config.agent.workspace.clone(),
            interval: Duration::from_secs(config.heartbeat.interval_minutes.max(1) * 60),
            manager,
        }
    }

    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Heartbeat service started");
        loop {
            tokio::time::sleep(self.interval).await;
            self.beat().await;
        }
    }

    async fn beat(&self) {
        let prompt = match std::fs::read_to_string(self.workspace.join(HEARTBEAT_FILE)) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                debug!("Heartbeat file empty, skipping");
                return;
            }
            Err(_) => {
                debug!("No heartbeat file, skipping");
                return;
            }
        };

        match self.manager.run_turn("heartbeat", &prompt).await {
            Ok(reply) => debug!(chars = reply.len(), "Heartbeat turn finished"),
            Err(e) => error!(error = %e, "Heartbeat turn failed"),
        }
    }
}

/// One entry in `workspace/cron/jobs.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub name: String,
    pub prompt: String,
    pub interval_minutes: u64,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

impl CronJob {
    /// A job is due when it never ran or its interval has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_run {
            None => true,
            Some(last) => {
                now.signed_duration_since(last).num_minutes() >= self.interval_minutes as i64
            }
        }
    }
}

/// Polls the cron jobs file every minute and runs due jobs, persisting
/// `last_run` after each.
pub struct CronService {
    manager: Arc<SessionManager>,
    jobs_path: PathBuf,
}

impl CronService {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            jobs_path: manager.config().agent.workspace.join(CRON_FILE),
            manager,
        }
    }

    pub async fn run(self) {
        info!(path = %self.jobs_path.display(), "Cron service started");
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            self.tick(Utc::now()).await;
        }
    }

    async fn tick(&self, now: DateTime<Utc>) {
        let Some(mut jobs) = self.load_jobs() else {
            return;
        };

        let mut dirty = false;
        for job in jobs.iter_mut() {
            if !job.is_due(now) {
                continue;
            }
            info!(job = %job.name, "Running cron job");
            let session = format!("cron:{}", job.name);
            match self.manager.run_turn(&session, &job.prompt).await {
                Ok(_) => {}
                Err(e) => error!(job = %job.name, error = %e, "Cron job failed"),
            }
            job.last_run = Some(now);
            dirty = true;
        }

        if dirty {
            self.save_jobs(&jobs);
        }
    }

    fn load_jobs(&self) -> Option<Vec<CronJob>> {
        let text = std::fs::read_to_string(&self.jobs_path).ok()?;
        match serde_json::from_str(&text) {
            Ok(jobs) => Some(jobs),
            Err(e) => {
                warn!(path = %self.jobs_path.display(), error = %e, "Ignoring invalid cron jobs file");
                None
            }
        }
    }

    fn save_jobs(&self, jobs: &[CronJob]) {
        match serde_json::to_string_pretty(jobs) {
            Ok(rendered) => {
                if let Err(e) = std::fs::write(&self.jobs_path, rendered) {
                    warn!(error = %e, "Failed to persist cron state");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize cron state"),
        }
    }
}
