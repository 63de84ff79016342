use std::{net::SocketAddr, time::Duration};

use assistants_ox::client::{DEFAULT_BASE_URL, DEFAULT_BETA_HEADER};
use clap::Parser;
use thiserror::Error;

use crate::event::StreamFormat;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_ROUTE: &str = "/message";
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5721";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 120;

/// Problems with the relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing API key or assistant ID")]
    MissingSecrets,

    #[error("Invalid allowed origin: {0}")]
    InvalidOrigin(String),

    #[error("Route must start with '/': {0}")]
    InvalidRoute(String),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),
}

/// Relay configuration, read once at startup
///
/// Every field can be given as a flag or through the environment. Timeouts are
/// in seconds; `0` disables the bound.
#[derive(Debug, Clone, Parser)]
#[command(name = "assistants-relay", version, about)]
pub struct RelayConfig {
    /// API key used for the upstream bearer authentication
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Assistant that executes every run
    #[arg(long, env = "ASSISTANT_ID", default_value = "")]
    pub assistant_id: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Value of the `OpenAI-Beta` header
    #[arg(long, env = "OPENAI_BETA", default_value = DEFAULT_BETA_HEADER)]
    pub beta_header: String,

    #[arg(long, env = "RELAY_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Path of the relay endpoint
    #[arg(long, env = "RELAY_ROUTE", default_value = DEFAULT_ROUTE)]
    pub route: String,

    /// Origins allowed to call the relay from a browser
    #[arg(
        long = "allowed-origin",
        env = "RELAY_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = DEFAULT_ALLOWED_ORIGIN
    )]
    pub allowed_origins: Vec<String>,

    /// Framing of the client response stream
    #[arg(long, env = "RELAY_STREAM_FORMAT", value_enum, default_value_t = StreamFormat::Legacy)]
    pub stream_format: StreamFormat,

    #[arg(long, env = "RELAY_CONNECT_TIMEOUT", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout: u64,

    /// Bound on waiting for the upstream response headers
    #[arg(long, env = "RELAY_RESPONSE_TIMEOUT", default_value_t = DEFAULT_RESPONSE_TIMEOUT_SECS)]
    pub response_timeout: u64,

    /// Bound on the silence between two chunks of the upstream stream
    #[arg(long, env = "RELAY_IDLE_TIMEOUT", default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout: u64,
}

impl RelayConfig {
    /// Configuration with the given secrets and defaults everywhere else
    pub fn new(api_key: impl Into<String>, assistant_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            assistant_id: assistant_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            beta_header: DEFAULT_BETA_HEADER.to_string(),
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            route: DEFAULT_ROUTE.to_string(),
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
            stream_format: StreamFormat::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT_SECS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT_SECS,
        }
    }

    /// Both secrets must be non-empty
    pub fn validate_secrets(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() || self.assistant_id.trim().is_empty() {
            return Err(ConfigError::MissingSecrets);
        }
        Ok(())
    }

    /// Everything the server needs to start, secrets included
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_secrets()?;
        if !self.route.starts_with('/') {
            return Err(ConfigError::InvalidRoute(self.route.clone()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        bound(self.response_timeout)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        bound(self.idle_timeout)
    }
}

fn bound(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
