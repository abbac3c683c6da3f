//! Configuration surface for the server coordinator and the interception
//! plugin.
//!
//! Every section implements [`Default`] with production-sensible values so
//! that a bare `[section]` header (or no file at all) produces a working
//! configuration. Construction arguments always take precedence over
//! file-supplied defaults: callers build a config value directly (`Default`
//! plus field overrides) or parse one from TOML with [`PluginConfig::from_toml_str`]
//! / [`ServerConfig::from_toml_str`]; no environment or CLI parsing happens in
//! this crate.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod error;

pub use error::{ConfigError, ConfigResult};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Plugin-side configuration: which server to attach to, which agents to
/// intercept, and how aggressively to reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Network endpoint of the Server Coordinator, e.g. `"127.0.0.1:7777"`.
    pub server_address: String,
    /// Attach to an existing session if set; otherwise a new one is created
    /// on first intercept.
    pub session_id: Option<String>,
    /// Agent names to intercept. Empty means intercept every agent.
    pub target_agents: HashSet<String>,
    /// Reconnection policy for the subscribe stream.
    pub reconnect: ReconnectPolicy,
    /// Per-subscription buffer bound, sent to the server as the `subscribe`
    /// RPC's `buffer_size` argument and honored when this subscriber is the
    /// first to attach to its session (a session's broadcast channel, once
    /// created, has one fixed capacity shared by every subscriber attached
    /// to it afterward — see `EventBroadcaster::channel_with_capacity`).
    pub subscribe_buffer_size: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:7777".to_string(),
            session_id: None,
            target_agents: HashSet::new(),
            reconnect: ReconnectPolicy::default(),
            subscribe_buffer_size: 256,
        }
    }
}

impl PluginConfig {
    /// Parse a configuration from a TOML document. Missing sections and
    /// fields fall back to [`Default`].
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Whether `agent_name` should be intercepted under this configuration.
    #[must_use]
    pub fn intercepts(&self, agent_name: &str) -> bool {
        self.target_agents.is_empty() || self.target_agents.contains(agent_name)
    }
}

/// Bounded-attempt exponential backoff with full jitter, matching the
/// reconnect policy every outbound client in this workspace uses:
/// `delay = random(0, min(cap, base * 2^attempt))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Maximum reconnection attempts before giving up and going `Terminal`.
    pub max_attempts: u32,
    /// Base delay for exponential backoff (milliseconds).
    pub backoff_initial_ms: u64,
    /// Maximum backoff delay (milliseconds).
    pub backoff_max_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            backoff_initial_ms: 200,
            backoff_max_ms: 30_000,
        }
    }
}

/// Server-side configuration: bind address, storage location, and the
/// default per-subscription buffer bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the RPC server binds to, e.g. `"127.0.0.1:7777"`.
    pub bind_address: String,
    /// Directory backing the embedded key-value store. `None` runs fully
    /// in-memory (ephemeral; no recovery across restarts).
    pub storage_path: Option<String>,
    /// Default per-subscription buffer bound, applied when a client does not
    /// request a different one.
    pub subscribe_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7777".to_string(),
            storage_path: None,
            subscribe_buffer_size: 256,
        }
    }
}

impl ServerConfig {
    /// Parse a configuration from a TOML document. Missing sections and
    /// fields fall back to [`Default`].
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plugin_config_intercepts_everything() {
        let config = PluginConfig::default();
        assert!(config.intercepts("orch"));
        assert!(config.intercepts("anything"));
    }

    #[test]
    fn non_empty_filter_only_intercepts_named_agents() {
        let mut config = PluginConfig::default();
        config.target_agents.insert("orch".to_string());
        assert!(config.intercepts("orch"));
        assert!(!config.intercepts("other"));
    }

    #[test]
    fn empty_toml_document_falls_back_to_defaults() {
        let config = PluginConfig::from_toml_str("").unwrap();
        assert_eq!(config, PluginConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = PluginConfig::from_toml_str(
            r#"
            server_address = "10.0.0.5:9000"

            [reconnect]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.server_address, "10.0.0.5:9000");
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.backoff_initial_ms, 200);
        assert_eq!(config.subscribe_buffer_size, 256);
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = PluginConfig::from_toml_str("not valid = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn server_config_parses_storage_path() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind_address = "0.0.0.0:7777"
            storage_path = "/var/lib/handoff"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage_path.as_deref(), Some("/var/lib/handoff"));
    }
}
