//! Session manager — one agent and one history per conversation key.
//!
//! Session ids are opaque map keys: "cli" for the local session,
//! "<channel>:<conversation-id>" for networked callers. The registry lock
//! covers table and history mutation only, never a model call, so
//! concurrent sessions never block each other's turns. Two concurrent turns
//! on the same id may interleave; the manager does not serialize at that
//! granularity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pincer_config::AppConfig;
use pincer_core::error::Error;
use pincer_core::message::{Message, Role};
use pincer_core::tool::NotifyFn;
use tracing::{debug, info};

use crate::turn::Agent;

struct SessionEntry {
    agent: Arc<Agent>,
    history: Vec<Message>,
}

pub struct SessionManager {
    config: AppConfig,
    notify: Option<Arc<NotifyFn>>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionManager {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            notify: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Attach an out-of-band notification channel handed to every agent
    /// created from here on.
    pub fn with_notify(mut self, notify: Arc<NotifyFn>) -> Self {
        self.notify = Some(notify);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The agent for `id`, created on first use. Idempotent: every call for
    /// the same id returns the same `Arc<Agent>` for the process lifetime.
    pub fn get(&self, id: &str) -> Result<Arc<Agent>, Error> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = sessions.get(id) {
            return Ok(entry.agent.clone());
        }

        info!(session = id, "Creating session");
        let agent = Arc::new(Agent::from_config(&self.config, self.notify.clone())?);
        sessions.insert(
            id.to_string(),
            SessionEntry {
                agent: agent.clone(),
                history: Vec::new(),
            },
        );
        Ok(agent)
    }

    /// Ordered copy of the session history. Unknown ids yield an empty list.
    pub fn history(&self, id: &str) -> Vec<Message> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(id)
            .map(|entry| entry.history.clone())
            .unwrap_or_default()
    }

    /// Append a message to the session history, trimming to the configured
    /// bound. The oldest non-system messages go first; a leading system
    /// message always survives.
    pub fn append(&self, id: &str, message: Message) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = sessions.get_mut(id) else {
            debug!(session = id, "Dropping append for unknown session");
            return;
        };
        entry.history.push(message);
        trim_history(&mut entry.history, self.config.agent.max_history);
    }

    /// Drop the history but keep the agent.
    pub fn clear(&self, id: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = sessions.get_mut(id) {
            entry.history.clear();
        }
    }

    /// Remove the session entirely; the next `get` recreates it.
    pub fn close(&self, id: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if sessions.remove(id).is_some() {
            info!(session = id, "Closed session");
        }
    }

    /// Active session ids, sorted.
    pub fn sessions(&self) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Convenience for non-streaming callers (scheduler, tests): run one
    /// turn and record both sides in the history.
    pub async fn run_turn(&self, id: &str, text: &str) -> Result<String, Error> {
        let agent = self.get(id)?;
        let history = self.history(id);
        let reply = agent.run(text, &history, None).await;
        self.append(id, Message::user(text));
        self.append(id, Message::assistant(&reply));
        Ok(reply)
    }
}

fn trim_history(history: &mut Vec<Message>, max: usize) {
    if max == 0 || history.len() <= max {
        return;
    }
    let keep_first = history
        .first()
        .map(|m| m.role == Role::System)
        .unwrap_or(false);
    let excess = history.len() - max;
    if keep_first {
        history.drain(1..1 + excess);
    } else {
        history.drain(0..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_keeps_newest() {
        let mut history: Vec<Message> =
            (0..10).map(|i| Message::user(format!("m{i}"))).collect();
        trim_history(&mut history, 4);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].text(), "m6");
        assert_eq!(history[3].text(), "m9");
    }

    #[test]
    fn trim_preserves_leading_system_message() {
        let mut history = vec![Message::system("rules")];
        history.extend((0..10).map(|i| Message::user(format!("m{i}"))));
        trim_history(&mut history, 4);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[1].text(), "m7");
        assert_eq!(history[3].text(), "m9");
    }

    #[test]
    fn trim_noop_under_bound() {
        let mut history = vec![Message::user("only")];
        trim_history(&mut history, 40);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn unknown_session_history_is_empty() {
        let manager = SessionManager::new(AppConfig::default());
        assert!(manager.history("nobody").is_empty());
        assert!(manager.sessions().is_empty());
    }

    fn configured(workspace: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.agent.workspace = workspace.join("ws");
        config.providers.insert(
            "groq".into(),
            pincer_config::ProviderConfig {
                api_key: "test-key".into(),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn get_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(configured(dir.path()));

        let first = manager.get("cli").unwrap();
        let second = manager.get("cli").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.sessions(), ["cli"]);
    }

    #[test]
    fn close_drops_the_agent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(configured(dir.path()));

        let first = manager.get("cli").unwrap();
        manager.close("cli");
        assert!(manager.sessions().is_empty());
        let recreated = manager.get("cli").unwrap();
        assert!(!Arc::ptr_eq(&first, &recreated));
    }

    #[test]
    fn get_without_provider_fails() {
        // Default config has no API keys, so agent construction must fail
        // rather than silently producing a dead agent.
        let manager = SessionManager::new(AppConfig::default());
        assert!(manager.get("cli").is_err());
    }
}
