//! HubBridge Bridge Framework
//!
//! Common abstractions for building bridges that poll devices and publish
//! their readings to a home-automation hub over MQTT.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`Publisher`] for Home Assistant discovery and state messages
//! - [`StateSink`] seam so pollers can be tested without a broker
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`StatusPublisher`] for bridge online/offline reporting
//!
//! # Example
//!
//! ```ignore
//! use hubbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
//!
//!     // Spawn device workers
//!     let publisher = runner.publisher();
//!     runner.tasks_mut().spawn(my_worker(publisher));
//!
//!     // Run until Ctrl+C or SIGTERM
//!     runner.run().await
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::{DeviceIdentity, PublishStats, Publisher, StateSink};
pub use runner::{BridgeRunner, shutdown_signal};
pub use status::StatusPublisher;

// Re-export commonly used types from hubbridge-common
pub use hubbridge_common::{
    DeviceStatus, LoggingConfig, MqttConfig, PollResult, Reading, ReadingValue, TopicBuilder,
};
