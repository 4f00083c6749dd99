//! Layered watchdog settings
//!
//! Built-in defaults, then an optional TOML file, then `WATCHDOG__`
//! environment variables (`WATCHDOG__DISPATCHER__BASE_URL=...`).

use crate::ConfigError;
use alerting::DispatcherConfig;
use container_runtime::{DockerConfig, DEFAULT_SOCKET};
use escalation::EscalationConfig;
use event_bus::{OverflowPolicy, DEFAULT_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "watchdog.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "WATCHDOG";

/// Container runtime connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub docker_socket: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            docker_socket: PathBuf::from(DEFAULT_SOCKET),
            request_timeout_secs: 5,
        }
    }
}

impl RuntimeSettings {
    /// Docker client configuration for these settings
    pub fn docker_config(&self) -> DockerConfig {
        DockerConfig {
            socket_path: self.docker_socket.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Detector to dispatcher event channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            overflow: OverflowPolicy::Block,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete watchdog configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub runtime: RuntimeSettings,
    pub channel: ChannelSettings,
    pub detector: EscalationConfig,
    pub dispatcher: DispatcherConfig,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from `path` (or [`DEFAULT_CONFIG_FILE`]) and the
    /// process environment.
    ///
    /// An explicitly given file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(
        path: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel.capacity must be at least 1".to_string(),
            ));
        }
        if self.runtime.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "runtime.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        self.detector.validate()?;
        self.dispatcher.validate()?;
        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
