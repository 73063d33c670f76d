//! Bridge runner for lifecycle management.

use std::time::Duration;

use tokio::signal;
use tokio::task::{JoinHandle, JoinSet};

use hubbridge_common::session::run_event_loop;
use hubbridge_common::{LoggingConfig, connect, init_tracing};

use crate::BridgeArgs;
use crate::TopicBuilder;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::Publisher;
use crate::status::StatusPublisher;

/// How long queued messages get to reach the broker on shutdown.
const FLUSH_GRACE: Duration = Duration::from_millis(500);

/// Bridge runner that manages the lifecycle of a device bridge.
///
/// Handles:
/// - Logging initialization
/// - MQTT connection (with broker fallback) and its event loop
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C / SIGTERM
/// - Bridge online/offline status
///
/// # Example
///
/// ```ignore
/// use hubbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///
///     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
///
///     let publisher = runner.publisher();
///     runner.tasks_mut().spawn(async move {
///         // Worker logic here
///     });
///
///     runner.run().await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging and status.
    name: String,
    /// Bridge version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Publisher for discovery and state.
    publisher: Publisher,
    /// Bridge status publisher.
    status_publisher: StatusPublisher,
    /// Task driving the MQTT event loop.
    event_loop: JoinHandle<()>,
    /// Spawned worker tasks.
    tasks: JoinSet<()>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    ///
    /// This will:
    /// 1. Initialize logging based on config
    /// 2. Connect to the MQTT broker
    /// 3. Create the publisher
    pub async fn new(name: impl Into<String>, config: C) -> Result<Self> {
        Self::new_with_args(name, config, None).await
    }

    /// Create a new bridge runner with CLI args for log level override.
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let log_config = match args.and_then(|a| a.log_level.clone()) {
            Some(level) => LoggingConfig {
                level,
                ..config.logging().clone()
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let mqtt = config.mqtt();
        let topics = TopicBuilder::new(&mqtt.discovery_prefix, &mqtt.state_base_topic);
        let session = connect(mqtt, Some(StatusPublisher::last_will(&topics))).await?;

        let event_loop = tokio::spawn(run_event_loop(session.eventloop, session.host.clone()));

        let publisher = Publisher::new(session.client, topics);
        let status_publisher = StatusPublisher::new(publisher.clone(), &name, &version);

        Ok(Self {
            name,
            version,
            config,
            publisher,
            status_publisher,
            event_loop,
            tasks: JoinSet::new(),
        })
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the bridge version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Number of worker tasks spawned so far.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Worker tasks. Anything spawned here is aborted on shutdown.
    pub fn tasks_mut(&mut self) -> &mut JoinSet<()> {
        &mut self.tasks
    }

    /// Run the bridge until a shutdown signal is received.
    ///
    /// This will:
    /// 1. Publish "online" status
    /// 2. Wait for Ctrl+C / SIGTERM, or for every worker to end
    /// 3. Abort all spawned tasks
    /// 4. Publish "offline" status and disconnect
    pub async fn run(mut self) -> Result<()> {
        if let Err(e) = self.status_publisher.publish_running().await {
            tracing::warn!(error = %e, "Failed to publish online status");
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        tokio::select! {
            _ = shutdown_signal() => {
                tracing::info!(bridge = %self.name, "Received shutdown signal");
            }
            _ = wait_for_workers(&mut self.tasks) => {
                tracing::warn!(bridge = %self.name, "All workers stopped");
            }
        }

        // In-flight device requests are abandoned, not awaited.
        self.tasks.abort_all();

        if let Err(e) = self.status_publisher.publish_offline().await {
            tracing::warn!(error = %e, "Failed to publish offline status");
        }

        match tokio::time::timeout(FLUSH_GRACE, self.publisher.client().disconnect()).await {
            Ok(Err(e)) => tracing::warn!(error = %e, "Error disconnecting from MQTT broker"),
            Err(_) => tracing::debug!("MQTT disconnect timed out"),
            Ok(Ok(())) => {}
        }

        tokio::time::sleep(FLUSH_GRACE).await;
        self.event_loop.abort();

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}

async fn wait_for_workers(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!(error = %e, "Worker panicked");
            }
        }
    }
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
