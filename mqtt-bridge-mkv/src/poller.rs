//! MKV device polling and state publishing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use hubbridge_common::{DeviceHealth, DeviceStatus, PollResult, Reading};
use hubbridge_framework::{DeviceIdentity, PublishStats, StateSink};

use crate::catalog::RegisterDescriptor;
use crate::client::{DeviceClient, TransportError};
use crate::codec::{self, DecodeError};
use crate::config::DeviceConfig;
use crate::cyclelog::{CycleLog, CycleSummary};

/// Time between the starts of two cycles of one device.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const MANUFACTURER: &str = "Atlas Copco";
pub const SW_VERSION: &str = "MK5s Touch";

/// Error type for one poll cycle.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Where a poller is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerState {
    /// Not started yet.
    #[default]
    Idle,
    Querying,
    Decoding,
    Publishing,
    /// Waiting for the next cycle.
    Sleeping,
}

/// Observable status of a poller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollerStatus {
    pub state: PollerState,
    /// Completed cycles, successful or not.
    pub cycles: u64,
    pub health: DeviceHealth,
    /// Last availability the hub accepted, if any.
    pub availability: Option<DeviceStatus>,
}

/// A poller for a single MKV controller.
pub struct DevicePoller<C, S> {
    device: DeviceConfig,
    identity: DeviceIdentity,
    descriptors: Arc<[RegisterDescriptor]>,
    question: Vec<String>,
    client: Arc<C>,
    sink: S,
    log: CycleLog,
    interval: Duration,
    status: watch::Sender<PollerStatus>,
}

impl<C: DeviceClient, S: StateSink> DevicePoller<C, S> {
    /// Create a new poller for a device and its register table.
    pub fn new(
        device: DeviceConfig,
        descriptors: Arc<[RegisterDescriptor]>,
        client: Arc<C>,
        sink: S,
    ) -> Self {
        let identity = DeviceIdentity::new(
            &device.name,
            &device.host,
            &device.device_type,
            MANUFACTURER,
        )
        .with_sw_version(SW_VERSION);
        let question = descriptors.iter().map(|d| d.id.clone()).collect();
        let (status, _) = watch::channel(PollerStatus::default());

        Self {
            device,
            identity,
            descriptors,
            question,
            client,
            sink,
            log: CycleLog::new(),
            interval: DEFAULT_POLL_INTERVAL,
            status,
        }
    }

    /// Override how the device is presented to the hub.
    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Set the cycle interval. A zero interval falls back to the default.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = if interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        self
    }

    /// Share a cycle log with other pollers.
    pub fn with_log(mut self, log: CycleLog) -> Self {
        self.log = log;
        self
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    /// Watch the poller's status.
    pub fn subscribe(&self) -> watch::Receiver<PollerStatus> {
        self.status.subscribe()
    }

    /// Run the polling loop. Never returns; abort the task to stop it.
    ///
    /// Cycles start `interval` apart. A cycle that overruns the interval
    /// is followed immediately by the next one.
    pub async fn run(self) {
        info!(
            "Starting MKV poller for device '{}' ({} at {}, interval: {:?})",
            self.device.name, self.device.device_type, self.device.host, self.interval
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once().await;
            self.set_state(PollerState::Sleeping);
        }
    }

    /// Perform a single poll cycle.
    ///
    /// Failures are logged and reported in the result; nothing is published
    /// for a failed cycle.
    pub async fn poll_once(&self) -> PollResult {
        let started = Instant::now();
        let mut result = PollResult::new(&self.device.name);
        let mut published = None;

        match self.fetch(&mut result).await {
            Ok(readings) => {
                result.readings = readings;
                published = Some(self.publish(&result).await);
            }
            Err(e) => result.error = Some(e.to_string()),
        }

        let health = self.record_health(&result);
        self.sync_availability(health).await;

        self.log
            .emit(CycleSummary {
                result: &result,
                device_type: &self.device.device_type,
                host: &self.device.host,
                elapsed: started.elapsed(),
                published,
            })
            .await;

        self.status.send_modify(|status| status.cycles += 1);

        result
    }

    async fn fetch(&self, result: &mut PollResult) -> Result<Vec<Reading>, CycleError> {
        self.set_state(PollerState::Querying);
        let answer = self
            .client
            .query(&self.device.host, self.device.timeout, &self.question)
            .await?;

        self.set_state(PollerState::Decoding);
        let readings = codec::decode(&answer, &self.descriptors);
        result.raw_answer = Some(answer);

        Ok(readings?)
    }

    async fn publish(&self, result: &PollResult) -> PublishStats {
        self.set_state(PollerState::Publishing);

        let discovery = self
            .sink
            .publish_discovery(&self.identity, &result.readings)
            .await;
        let state = self
            .sink
            .publish_state(&self.identity, &result.readings, result.timestamp)
            .await;

        PublishStats {
            success: discovery.success + state.success,
            failed: discovery.failed + state.failed,
        }
    }

    /// Update device health and return the resulting status.
    ///
    /// Watchers are notified once the whole cycle is done, when `cycles`
    /// is incremented.
    fn record_health(&self, result: &PollResult) -> DeviceStatus {
        let mut current = DeviceStatus::Unknown;
        self.status.send_if_modified(|status| {
            match &result.error {
                None => status.health.record_success(result.timestamp),
                Some(e) => status.health.record_failure(e.clone()),
            };
            current = status.health.status;
            false
        });
        current
    }

    /// Publish the availability unless the hub already has it.
    ///
    /// A rejected publish is retried on the next cycle.
    async fn sync_availability(&self, current: DeviceStatus) {
        let delivered = self.status.borrow().availability;
        if delivered == Some(current) {
            return;
        }

        match self.sink.publish_availability(&self.identity, current).await {
            Ok(()) => {
                self.status.send_if_modified(|status| {
                    status.availability = Some(current);
                    false
                });
            }
            Err(e) => {
                warn!(device = %self.device.name, error = %e, "Failed to publish availability");
            }
        }
    }

    fn set_state(&self, state: PollerState) {
        self.status.send_if_modified(|status| {
            let modified = status.state != state;
            status.state = state;
            modified
        });
    }
}
