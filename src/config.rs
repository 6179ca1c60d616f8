//! Runtime configuration for the content pipeline
//!
//! Settings load from an optional TOML file over hand-written defaults,
//! section by section. The agent API key never lives in the file; it is
//! read from the `ANTHROPIC_API_KEY` environment variable when the agent
//! client is built.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{CalliopeError, Result};
use crate::pipeline::PollSettings;

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalliopeConfig {
    /// API server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Generation agent settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Highlighting settings
    #[serde(default)]
    pub highlight: HighlightSettings,

    /// Reconciliation polling settings
    #[serde(default)]
    pub poll: PollSettings,

    /// Editor auto-save settings
    #[serde(default)]
    pub autosave: AutoSaveSettings,
}

/// Settings for the HTTP API server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Event broadcast channel capacity
    pub event_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            event_capacity: 1000,
        }
    }
}

impl ServerSettings {
    /// Resolve the bind address from host and port
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            invalid(format!(
                "Invalid server address {}:{}: {}",
                self.host, self.port, e
            ))
        })
    }
}

/// Settings for the generation agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Model identifier
    pub model: String,

    /// Maximum tokens per completion
    pub max_tokens: usize,

    /// Sampling temperature (0.0-1.0)
    pub temperature: f32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

/// Settings for semantic highlighting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightSettings {
    /// Render recognized markup as highlight spans
    pub enabled: bool,

    /// Annotation cache capacity (entries)
    pub cache_capacity: usize,

    /// Annotation cache TTL in seconds
    pub cache_ttl_seconds: u64,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_capacity: 128,
            cache_ttl_seconds: 3600, // 1 hour
        }
    }
}

/// Settings for the editor auto-saver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSaveSettings {
    /// Quiet period before a pending edit is persisted (in milliseconds)
    pub debounce_ms: u64,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self { debounce_ms: 2000 }
    }
}

impl CalliopeConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: CalliopeConfig = toml::from_str(toml_str)
            .map_err(|e| invalid(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.event_capacity == 0 {
            return Err(invalid("server.event_capacity must be at least 1"));
        }
        self.server.socket_addr()?;

        if self.agent.max_tokens == 0 {
            return Err(invalid("agent.max_tokens must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.agent.temperature) {
            return Err(invalid("agent.temperature must be between 0.0 and 1.0"));
        }

        if self.highlight.cache_capacity == 0 {
            return Err(invalid("highlight.cache_capacity must be at least 1"));
        }

        // Anything shorter hammers the status endpoint
        if self.poll.interval_ms < 100 {
            return Err(invalid("poll.interval_ms must be at least 100"));
        }
        if self.poll.max_attempts == 0 {
            return Err(invalid("poll.max_attempts must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> CalliopeError {
    CalliopeError::Config(config::ConfigError::Message(message.into()))
}
