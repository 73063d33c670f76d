//! MQTT bridge for Atlas Copco MKV compressor controllers.
//!
//! This bridge polls MKV controllers and publishes their readings to
//! Home Assistant via MQTT discovery.

use std::sync::Arc;

use anyhow::{Context, Result};
use hubbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
use mqtt_bridge_mkv::client::HttpDeviceClient;
use mqtt_bridge_mkv::config::MkvBridgeConfig;
use mqtt_bridge_mkv::scheduler::{PollSettings, Scheduler};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("mkv.json5");

    let config = MkvBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    let devices = config.mkv.devices()?;
    let catalog = config.mkv.catalog()?;

    let client = Arc::new(HttpDeviceClient::new(config.mkv.cgi_path.clone()));
    let settings = PollSettings::from(&config.mkv);

    let mut runner = BridgeRunner::new_with_args("mqtt-bridge-mkv", config, Some(&args)).await?;
    info!("Loaded configuration from {:?}", args.config);

    let scheduler = Scheduler::new(catalog, client, runner.publisher()).with_settings(settings);
    scheduler
        .spawn_all(&devices, runner.tasks_mut())
        .context("No controller can be polled")?;

    info!("MKV bridge running with {} device(s)", runner.task_count());

    runner.run().await?;
    Ok(())
}
