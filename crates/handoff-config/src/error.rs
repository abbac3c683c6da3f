//! Configuration parse errors.

/// Failures from loading a [`crate::PluginConfig`] or [`crate::ServerConfig`]
/// from TOML.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
