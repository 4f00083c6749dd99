//! Container Health Watchdog
//!
//! Wires the escalation detector and the alert dispatcher together:
//! - layered [`Settings`] (defaults, TOML file, environment)
//! - tracing subscriber setup
//! - one shutdown signal shared by both loops

mod settings;

pub use settings::{
    ChannelSettings, LoggingSettings, RuntimeSettings, Settings, DEFAULT_CONFIG_FILE, ENV_PREFIX,
};

use alerting::{AlertTransport, DispatchError, Dispatcher, HttpTransport, TransportError};
use container_runtime::{ContainerRuntime, DockerRuntime};
use escalation::{Detector, DetectorError};
use event_bus::{channel, ShutdownTrigger};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Configuration and startup errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    Dispatcher(#[from] DispatchError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to install tracing subscriber: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize tracing.
///
/// `RUST_LOG` overrides the configured level; `verbose` raises the default
/// to `debug`.
pub fn init_logging(settings: &LoggingSettings, verbose: bool) -> Result<(), ConfigError> {
    let level = if verbose { "debug" } else { settings.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    if settings.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Detector and dispatcher sharing one event channel
pub struct Watchdog {
    detector: Detector,
    dispatcher: Dispatcher,
    trigger: ShutdownTrigger,
}

impl Watchdog {
    /// Build the pipeline against any runtime and transport.
    pub fn new(
        settings: &Settings,
        runtime: Arc<dyn ContainerRuntime>,
        transport: Arc<dyn AlertTransport>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        let (events, receiver) = channel(settings.channel.capacity, settings.channel.overflow);
        let (trigger, shutdown) = ShutdownTrigger::new();

        let detector = Detector::new(runtime.clone(), events, settings.detector.clone())?;
        let dispatcher = Dispatcher::new(
            runtime,
            transport,
            receiver,
            settings.dispatcher.clone(),
            shutdown,
        )?;

        Ok(Self {
            detector,
            dispatcher,
            trigger,
        })
    }

    /// Build the production pipeline: Docker over its unix socket, alerts
    /// over HTTP.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let runtime = Arc::new(DockerRuntime::new(settings.runtime.docker_config()));
        let transport = Arc::new(HttpTransport::new(
            &settings.dispatcher.base_url,
            settings.dispatcher.request_timeout(),
        )?);
        Self::new(settings, runtime, transport)
    }

    /// Run both loops until `stop` resolves, then shut them down.
    pub async fn run_until<F>(self, stop: F)
    where
        F: std::future::Future<Output = ()>,
    {
        let Watchdog {
            detector,
            dispatcher,
            trigger,
        } = self;

        let shutdown = trigger.subscribe();
        let detector_task = tokio::spawn(async move { detector.run(shutdown).await });
        let dispatcher_task = tokio::spawn(dispatcher.run());

        stop.await;
        info!("Shutdown requested");
        trigger.trigger();

        if let Err(e) = detector_task.await {
            error!(error = %e, "escalation detector task failed");
        }
        if let Err(e) = dispatcher_task.await {
            error!(error = %e, "alert dispatcher task failed");
        }
        info!("Watchdog stopped");
    }
}
