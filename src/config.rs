//! # Configuration Management
//!
//! Centralized configuration for RCON clients and the connection supervisor.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! The defaults mirror what game server consoles expect: a 30 second idle
//! window, 15 second command deadline, and a 20 second keep-alive cadence so
//! the idle window never elapses on a healthy link.

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Max accepted inbound payload size (1 MiB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Command sent by the keep-alive loop
pub const DEFAULT_KEEPALIVE_COMMAND: &str = "ping";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RconConfig {
    /// Per-connection client settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Supervisor settings
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RconConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables, starting from defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(val) = env_millis("RCON_CONNECT_TIMEOUT_MS")? {
            config.client.connect_timeout = val;
        }
        if let Some(val) = env_millis("RCON_IDLE_TIMEOUT_MS")? {
            config.client.idle_timeout = val;
        }
        if let Some(val) = env_millis("RCON_AUTH_TIMEOUT_MS")? {
            config.client.auth_timeout = val;
        }
        if let Some(val) = env_millis("RCON_COMMAND_TIMEOUT_MS")? {
            config.client.command_timeout = val;
        }
        if let Some(val) = env_millis("RCON_KEEPALIVE_INTERVAL_MS")? {
            config.client.keepalive_interval = val;
        }
        if let Ok(cmd) = std::env::var("RCON_KEEPALIVE_COMMAND") {
            config.client.keepalive_command = cmd;
        }
        if let Some(val) = env_millis("RCON_SWEEP_INTERVAL_MS")? {
            config.supervisor.sweep_interval = val;
        }
        if let Ok(level) = std::env::var("RCON_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| ProtocolError::ConfigError(format!("Invalid log level: {level}")))?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.supervisor.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| ProtocolError::ConfigError(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Per-connection client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Deadline for the TCP connect itself
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Inactivity window; reset by every received byte and every keep-alive sent
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Deadline for the authentication response
    #[serde(with = "duration_serde")]
    pub auth_timeout: Duration,

    /// Deadline for each command response
    #[serde(with = "duration_serde")]
    pub command_timeout: Duration,

    /// Interval between keep-alive commands once authenticated
    #[serde(with = "duration_serde")]
    pub keepalive_interval: Duration,

    /// Command text used for keep-alives
    pub keepalive_command: String,

    /// Largest inbound payload accepted before the connection is dropped
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: timeout::CONNECT_TIMEOUT,
            idle_timeout: timeout::IDLE_TIMEOUT,
            auth_timeout: timeout::AUTH_TIMEOUT,
            command_timeout: timeout::COMMAND_TIMEOUT,
            keepalive_interval: timeout::KEEPALIVE_INTERVAL,
            keepalive_command: String::from(DEFAULT_KEEPALIVE_COMMAND),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.connect_timeout.as_millis() < 10 {
            errors.push("Connect timeout too short (minimum: 10ms)".to_string());
        }
        if self.idle_timeout.as_millis() < 10 {
            errors.push("Idle timeout too short (minimum: 10ms)".to_string());
        }
        if self.auth_timeout.as_millis() < 10 {
            errors.push("Auth timeout too short (minimum: 10ms)".to_string());
        }
        if self.command_timeout.as_millis() < 10 {
            errors.push("Command timeout too short (minimum: 10ms)".to_string());
        }

        if self.keepalive_interval.as_millis() < 10 {
            errors.push("Keep-alive interval too short (minimum: 10ms)".to_string());
        } else if self.keepalive_interval >= self.idle_timeout {
            errors.push(format!(
                "Keep-alive interval ({}ms) must be shorter than the idle timeout ({}ms)",
                self.keepalive_interval.as_millis(),
                self.idle_timeout.as_millis()
            ));
        }

        if self.keepalive_command.trim().is_empty() {
            errors.push("Keep-alive command cannot be empty".to_string());
        }

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size > 64 * 1024 * 1024 {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum: 64 MB)",
                self.max_payload_size
            ));
        }

        errors
    }
}

/// Supervisor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Interval of the liveness sweep
    #[serde(with = "duration_serde")]
    pub sweep_interval: Duration,

    /// Buffered status updates per subscriber before it starts lagging
    pub status_channel_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: timeout::SWEEP_INTERVAL,
            status_channel_capacity: 64,
        }
    }
}

impl SupervisorConfig {
    /// Validate supervisor configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.sweep_interval.as_millis() < 10 {
            errors.push("Sweep interval too short (minimum: 10ms)".to_string());
        } else if self.sweep_interval.as_secs() > 3600 {
            errors.push("Sweep interval too long (maximum: 1 hour)".to_string());
        }

        if self.status_channel_capacity == 0 {
            errors.push("Status channel capacity must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("rcon-supervisor"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
