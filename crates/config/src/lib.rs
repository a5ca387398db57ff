//! Configuration loading, validation, and management for Pincer.
//!
//! Loads configuration from `~/.pincer/config.toml` with environment
//! variable overrides for API keys. Every section has serde defaults so a
//! missing or partial file still produces a usable config.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pincer_core::tool::ToolSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Built-in provider registry: name → (api_base, default_model).
///
/// All of these speak the OpenAI-compatible `/chat/completions` protocol;
/// only the base URL and (for anthropic) the auth header scheme differ.
pub const PROVIDER_DEFAULTS: &[(&str, &str, &str)] = &[
    ("openrouter", "https://openrouter.ai/api/v1", "openai/gpt-4o-mini"),
    ("openai", "https://api.openai.com/v1", "gpt-4o-mini"),
    ("anthropic", "https://api.anthropic.com/v1", "claude-3-5-haiku-20241022"),
    ("groq", "https://api.groq.com/openai/v1", "llama3-8b-8192"),
    ("google", "https://generativelanguage.googleapis.com/v1beta/openai", "gemini-2.0-flash"),
    ("mistral", "https://api.mistral.ai/v1", "mistral-small-latest"),
    ("deepseek", "https://api.deepseek.com/v1", "deepseek-chat"),
    ("ollama", "http://localhost:11434/v1", "llama3.2"),
];

/// Errors raised while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The root configuration structure.
///
/// Maps directly to `~/.pincer/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Agent behavior defaults
    #[serde(default)]
    pub agent: AgentDefaults,

    /// Provider-specific configurations (keyed by provider name)
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Tool configuration
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Heartbeat (periodic task) configuration
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

/// Defaults governing every agent instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    /// Workspace directory (identity files, skills, tool manifests)
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Model override; "" = use the active provider's default model
    #[serde(default)]
    pub model: String,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tool-call iterations per turn (safety bound)
    #[serde(default = "default_max_iterations")]
    pub max_tool_iterations: u32,

    /// Maximum characters of a tool result before head/tail truncation
    #[serde(default = "default_max_tool_output")]
    pub max_tool_output_chars: usize,

    /// Maximum messages retained per session history
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Confine file and shell tools to the workspace
    #[serde(default)]
    pub restrict_to_workspace: bool,
}

fn default_workspace() -> PathBuf {
    AppConfig::config_dir().join("workspace")
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_iterations() -> u32 {
    20
}
fn default_max_tool_output() -> usize {
    8000
}
fn default_max_history() -> usize {
    40
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            model: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_tool_iterations: default_max_iterations(),
            max_tool_output_chars: default_max_tool_output(),
            max_history: default_max_history(),
            restrict_to_workspace: false,
        }
    }
}

/// One provider entry in the config file.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key ("" = not configured)
    #[serde(default)]
    pub api_key: String,

    /// Base URL override; "" = use the built-in default for this provider
    #[serde(default)]
    pub api_base: String,

    /// Model override for this provider
    #[serde(default)]
    pub model: String,
}

/// Tool settings section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Web search (Brave) settings
    #[serde(default)]
    pub web_search: WebSearchConfig,

    /// Shell wall-clock cap in seconds (hard ceiling 300 applied at runtime)
    #[serde(default = "default_shell_timeout")]
    pub shell_timeout_secs: u64,
}

fn default_shell_timeout() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web_search: WebSearchConfig::default(),
            shell_timeout_secs: default_shell_timeout(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Brave Search API key
    #[serde(default)]
    pub api_key: String,

    /// Default result count
    #[serde(default = "default_search_results")]
    pub max_results: usize,
}

fn default_search_results() -> usize {
    5
}

/// Heartbeat configuration — periodic execution of workspace/HEARTBEAT.md.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_heartbeat_interval")]
    pub interval_minutes: u64,
}

fn default_heartbeat_interval() -> u64 {
    30
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_heartbeat_interval(),
        }
    }
}

/// The provider resolved from config: everything the backend client needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveProvider {
    pub name: String,
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

// Secrets never appear in Debug output.
fn redact(s: &str) -> &'static str {
    if s.is_empty() { "\"\"" } else { "[REDACTED]" }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("agent", &self.agent)
            .field("providers", &self.providers)
            .field("tools", &self.tools)
            .field("heartbeat", &self.heartbeat)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl std::fmt::Debug for WebSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl AppConfig {
    /// The config directory, `~/.pincer`.
    pub fn config_dir() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pincer")
    }

    /// The config file path, `~/.pincer/config.toml`.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from the default path.
    ///
    /// Environment variables supply an API key when the file has none:
    /// `PINCER_API_KEY` (highest priority), then `OPENROUTER_API_KEY`,
    /// then `OPENAI_API_KEY` — the env key is attached to the matching
    /// provider entry (generic key → openrouter).
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit path. A missing file yields the
    /// built-in defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Persist configuration to the given path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let rendered = toml::to_string_pretty(self).expect("config serializes");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(path, rendered).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn apply_env_overrides(&mut self) {
        let from_env = [
            ("PINCER_API_KEY", "openrouter"),
            ("OPENROUTER_API_KEY", "openrouter"),
            ("OPENAI_API_KEY", "openai"),
        ];
        for (var, provider) in from_env {
            if let Ok(key) = std::env::var(var) {
                let entry = self.providers.entry(provider.to_string()).or_default();
                if entry.api_key.is_empty() {
                    entry.api_key = key;
                }
            }
        }
    }

    /// Resolve the first fully-configured provider.
    ///
    /// A provider is usable when it has an API key and a base URL (from the
    /// config entry or the built-in registry). The agent-level model
    /// override wins over provider model settings. Providers are checked
    /// in registry order so resolution is deterministic.
    pub fn active_provider(&self) -> Option<ActiveProvider> {
        for (name, default_base, default_model) in PROVIDER_DEFAULTS {
            let Some(entry) = self.providers.get(*name) else {
                continue;
            };
            if entry.api_key.is_empty() {
                continue;
            }
            let api_base = if entry.api_base.is_empty() {
                (*default_base).to_string()
            } else {
                entry.api_base.clone()
            };
            let model = if !self.agent.model.is_empty() {
                self.agent.model.clone()
            } else if !entry.model.is_empty() {
                entry.model.clone()
            } else {
                (*default_model).to_string()
            };
            return Some(ActiveProvider {
                name: (*name).to_string(),
                api_key: entry.api_key.clone(),
                api_base,
                model,
            });
        }
        None
    }

    /// Map the tool-relevant sections into the settings bundle tools see.
    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            web_search_api_key: self.tools.web_search.api_key.clone(),
            web_search_max_results: self.tools.web_search.max_results,
            shell_timeout_secs: self.tools.shell_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.agent.max_tool_iterations, 20);
        assert_eq!(config.agent.max_tool_output_chars, 8000);
        assert_eq!(config.agent.max_history, 40);
        assert_eq!(config.tools.shell_timeout_secs, 30);
        assert!(!config.agent.restrict_to_workspace);
        assert!(config.active_provider().is_none());
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(config.providers.is_empty());
    }

    #[test]
    fn load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[agent]
max_tool_iterations = 5

[providers.groq]
api_key = "gsk-test"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.max_tool_iterations, 5);
        // Untouched sections keep defaults
        assert_eq!(config.agent.max_history, 40);

        let active = config.active_provider().unwrap();
        assert_eq!(active.name, "groq");
        assert_eq!(active.api_base, "https://api.groq.com/openai/v1");
        assert_eq!(active.model, "llama3-8b-8192");
    }

    #[test]
    fn model_override_wins() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: "sk-test".into(),
                api_base: String::new(),
                model: "gpt-4o".into(),
            },
        );
        let active = config.active_provider().unwrap();
        assert_eq!(active.model, "gpt-4o");

        config.agent.model = "o1-mini".into();
        assert_eq!(config.active_provider().unwrap().model, "o1-mini");
    }

    #[test]
    fn provider_resolution_is_registry_ordered() {
        let mut config = AppConfig::default();
        for name in ["groq", "openrouter"] {
            config.providers.insert(
                name.into(),
                ProviderConfig {
                    api_key: "key".into(),
                    ..Default::default()
                },
            );
        }
        // openrouter comes first in the registry
        assert_eq!(config.active_provider().unwrap().name, "openrouter");
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.agent.restrict_to_workspace = true;
        config.tools.web_search.api_key = "brave-key".into();
        config.save_to(&path).unwrap();

        let reloaded = AppConfig::load_from(&path).unwrap();
        assert!(reloaded.agent.restrict_to_workspace);
        assert_eq!(reloaded.tools.web_search.api_key, "brave-key");
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: "sk-secret-value".into(),
                ..Default::default()
            },
        );
        config.tools.web_search.api_key = "brave-secret".into();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret-value"));
        assert!(!rendered.contains("brave-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn tool_settings_mapping() {
        let mut config = AppConfig::default();
        config.tools.shell_timeout_secs = 60;
        config.tools.web_search.max_results = 10;
        let settings = config.tool_settings();
        assert_eq!(settings.shell_timeout_secs, 60);
        assert_eq!(settings.web_search_max_results, 10);
    }
}
