//! One poller task per configured device.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use hubbridge_framework::{DeviceIdentity, StateSink};

use crate::catalog::Catalog;
use crate::client::DeviceClient;
use crate::config::{ConfigError, DeviceConfig, MkvConfig};
use crate::cyclelog::CycleLog;
use crate::poller::{DEFAULT_POLL_INTERVAL, DevicePoller, MANUFACTURER, PollerStatus, SW_VERSION};

/// Settings shared by every poller.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    /// Each poller starts after a random delay in `[0, start_jitter]`.
    pub start_jitter: Duration,
    pub manufacturer: String,
    pub sw_version: String,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            start_jitter: Duration::from_secs(4),
            manufacturer: MANUFACTURER.to_string(),
            sw_version: SW_VERSION.to_string(),
        }
    }
}

impl From<&MkvConfig> for PollSettings {
    fn from(config: &MkvConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            start_jitter: config.start_jitter(),
            manufacturer: config.manufacturer.clone(),
            sw_version: config.sw_version.clone(),
        }
    }
}

/// A poller ready to run, with its start delay.
pub struct PlannedPoller<C, S> {
    start_delay: Duration,
    poller: DevicePoller<C, S>,
}

impl<C: DeviceClient, S: StateSink> PlannedPoller<C, S> {
    pub fn device(&self) -> &DeviceConfig {
        self.poller.device()
    }

    pub fn start_delay(&self) -> Duration {
        self.start_delay
    }

    pub fn subscribe(&self) -> watch::Receiver<PollerStatus> {
        self.poller.subscribe()
    }

    /// Wait for the start delay, then poll forever.
    pub async fn run(self) {
        tokio::time::sleep(self.start_delay).await;
        self.poller.run().await;
    }
}

/// Creates the pollers of all configured devices.
pub struct Scheduler<C, S> {
    catalog: Catalog,
    client: Arc<C>,
    sink: S,
    log: CycleLog,
    settings: PollSettings,
}

impl<C, S> Scheduler<C, S>
where
    C: DeviceClient + 'static,
    S: StateSink + Clone + 'static,
{
    pub fn new(catalog: Catalog, client: Arc<C>, sink: S) -> Self {
        Self {
            catalog,
            client,
            sink,
            log: CycleLog::new(),
            settings: PollSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Create one poller per device.
    ///
    /// Devices of an unknown type are logged and skipped. Fails if no
    /// device is left.
    pub fn plan(&self, devices: &[DeviceConfig]) -> Result<Vec<PlannedPoller<C, S>>, ConfigError> {
        let mut rng = rand::thread_rng();
        let mut planned = Vec::with_capacity(devices.len());

        for device in devices {
            let descriptors = match self.catalog.lookup(&device.device_type) {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    error!(device = %device.name, error = %e, "Skipping device");
                    continue;
                }
            };

            let identity = DeviceIdentity::new(
                &device.name,
                &device.host,
                &device.device_type,
                &self.settings.manufacturer,
            )
            .with_sw_version(&self.settings.sw_version);

            let poller = DevicePoller::new(
                device.clone(),
                Arc::from(descriptors),
                self.client.clone(),
                self.sink.clone(),
            )
            .with_identity(identity)
            .with_interval(self.settings.interval)
            .with_log(self.log.clone());

            let start_delay = rng.gen_range(Duration::ZERO..=self.settings.start_jitter);

            planned.push(PlannedPoller {
                start_delay,
                poller,
            });
        }

        if planned.is_empty() {
            return Err(ConfigError::Validation(
                "No device can be polled: every configured device type is unknown".to_string(),
            ));
        }

        Ok(planned)
    }

    /// Spawn one task per device into `tasks`.
    ///
    /// Returns a status receiver per spawned poller, in device order.
    pub fn spawn_all(
        &self,
        devices: &[DeviceConfig],
        tasks: &mut JoinSet<()>,
    ) -> Result<Vec<watch::Receiver<PollerStatus>>, ConfigError> {
        let planned = self.plan(devices)?;
        let mut statuses = Vec::with_capacity(planned.len());

        for poller in planned {
            info!(
                "Starting poller for device '{}' ({} at {}) in {:?}",
                poller.device().name,
                poller.device().device_type,
                poller.device().host,
                poller.start_delay()
            );
            statuses.push(poller.subscribe());
            tasks.spawn(poller.run());
        }

        Ok(statuses)
    }
}
