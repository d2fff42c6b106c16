//! Configuration types and loading logic.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use redirect_tracing::TracingConfig;
use serde::Deserialize;

use crate::interceptor::{RedirectRule, MATCH_PATTERN, REDIRECT_TARGET};

/// Top-level proxy configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub redirect: RedirectConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Server listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Largest request body the proxy will buffer before forwarding.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// The redirect installed at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct RedirectConfig {
    /// Case-sensitive substring matched against textual addresses.
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Address fetched instead of any matching one.
    #[serde(default = "default_target")]
    pub target: String,
}

/// Rejected configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("redirect.pattern must not be empty")]
    EmptyPattern,

    #[error("redirect.target is not a valid URL: {0}")]
    InvalidTarget(String),
}

fn default_listen_address() -> String {
    "127.0.0.1:3080".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_pattern() -> String {
    MATCH_PATTERN.to_string()
}

fn default_target() -> String {
    REDIRECT_TARGET.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            target: default_target(),
        }
    }
}

impl RedirectConfig {
    /// Validate and convert into a [`RedirectRule`].
    pub fn rule(&self) -> Result<RedirectRule, ConfigError> {
        if self.pattern.is_empty() {
            return Err(ConfigError::EmptyPattern);
        }
        reqwest::Url::parse(&self.target)
            .map_err(|e| ConfigError::InvalidTarget(format!("{}: {e}", self.target)))?;
        Ok(RedirectRule::new(&self.pattern, &self.target))
    }
}

impl ProxyConfig {
    /// Load configuration from TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (FETCH_REDIRECT_ prefix, __ for nesting)
    /// 2. TOML config file (a missing file is not an error)
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let config: ProxyConfig = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("FETCH_REDIRECT_").split("__"))
            .extract()?;

        config.redirect.rule()?;
        Ok(config)
    }
}
