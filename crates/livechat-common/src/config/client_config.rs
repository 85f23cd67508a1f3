//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub timeline: TimelineConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Realtime gateway configuration (one backend)
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Backend name used in logs
    #[serde(default = "default_backend")]
    pub backend: String,
    /// WebSocket endpoint
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Maximum topics multiplexed on one connection
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions_per_connection: usize,
    /// Heartbeat interval used until the backend advertises a shorter one
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// First reconnect delay after a failure
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    /// Upper bound for the reconnect delay
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// Capacity of the mutator queue shared by all connections
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl GatewayConfig {
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    #[must_use]
    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    #[must_use]
    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_gateway_url(),
            max_subscriptions_per_connection: default_max_subscriptions(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

/// Per-room timeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineConfig {
    /// Maximum number of messages kept per room
    #[serde(default = "default_scrollback_limit")]
    pub scrollback_limit: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            scrollback_limit: default_scrollback_limit(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "livechat".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_backend() -> String {
    "kick".to_string()
}

fn default_gateway_url() -> String {
    "wss://ws-us2.pusher.com/app/32cbd69e4b950bf97679?protocol=7&client=js&version=8.4.0&flash=false"
        .to_string()
}

fn default_max_subscriptions() -> usize {
    100
}

fn default_heartbeat_interval_ms() -> u64 {
    20_000
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    16_000
}

fn default_event_queue_capacity() -> usize {
    1024
}

fn default_scrollback_limit() -> usize {
    1000
}

/// Parse an optional variable, falling back to `default` when it is unset
fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        None => Ok(default),
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Every variable is optional; a present but unparsable value is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: match lookup("APP_ENV") {
                    Some(raw) => Environment::parse(&raw)
                        .ok_or(ConfigError::InvalidValue("APP_ENV", raw))?,
                    None => default_env(),
                },
            },
            gateway: GatewayConfig {
                backend: lookup("LIVE_BACKEND").unwrap_or_else(default_backend),
                url: lookup("LIVE_GATEWAY_URL").unwrap_or_else(default_gateway_url),
                max_subscriptions_per_connection: parse_var(
                    &lookup,
                    "LIVE_MAX_SUBSCRIPTIONS",
                    default_max_subscriptions(),
                )?,
                heartbeat_interval_ms: parse_var(
                    &lookup,
                    "LIVE_HEARTBEAT_INTERVAL_MS",
                    default_heartbeat_interval_ms(),
                )?,
                reconnect_base_ms: parse_var(
                    &lookup,
                    "LIVE_RECONNECT_BASE_MS",
                    default_reconnect_base_ms(),
                )?,
                reconnect_max_ms: parse_var(
                    &lookup,
                    "LIVE_RECONNECT_MAX_MS",
                    default_reconnect_max_ms(),
                )?,
                event_queue_capacity: parse_var(
                    &lookup,
                    "LIVE_EVENT_QUEUE_CAPACITY",
                    default_event_queue_capacity(),
                )?,
            },
            timeline: TimelineConfig {
                scrollback_limit: parse_var(
                    &lookup,
                    "LIVE_SCROLLBACK_LIMIT",
                    default_scrollback_limit(),
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.max_subscriptions_per_connection == 0 {
            return Err(ConfigError::InvalidValue(
                "LIVE_MAX_SUBSCRIPTIONS",
                "0".to_string(),
            ));
        }
        if self.gateway.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "LIVE_HEARTBEAT_INTERVAL_MS",
                "0".to_string(),
            ));
        }
        if self.gateway.reconnect_max_ms < self.gateway.reconnect_base_ms {
            return Err(ConfigError::InvalidValue(
                "LIVE_RECONNECT_MAX_MS",
                self.gateway.reconnect_max_ms.to_string(),
            ));
        }
        if self.gateway.event_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "LIVE_EVENT_QUEUE_CAPACITY",
                "0".to_string(),
            ));
        }
        if self.timeline.scrollback_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "LIVE_SCROLLBACK_LIMIT",
                "0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
