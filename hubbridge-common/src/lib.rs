//! HubBridge Common Library
//!
//! This crate provides shared types and utilities for HubBridge device bridges:
//!
//! - [`reading`] - Decoded reading data model (`Reading`, `ReadingValue`, `PollResult`)
//! - [`discovery`] - Home Assistant MQTT discovery payloads
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`session`] - MQTT session management with broker fallback
//! - [`topic`] - Topic and identifier builders
//! - [`health`] - Per-device availability tracking types
//! - [`error`] - Error types

pub mod config;
pub mod discovery;
pub mod error;
pub mod health;
pub mod reading;
pub mod session;
pub mod topic;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, MqttConfig, parse_config};
pub use discovery::{DeviceInfo, SensorDiscovery, guess_device_class, guess_state_class};
pub use error::{Error, Result};
pub use health::{DeviceHealth, DeviceStatus};
pub use reading::{PollResult, Reading, ReadingValue, current_timestamp_millis};
pub use session::{MqttSession, connect};
pub use topic::{TopicBuilder, slugify, unique_id};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
