//! Home Assistant state publisher over MQTT.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, QoS};

use hubbridge_common::{DeviceInfo, SensorDiscovery, slugify, unique_id};

use crate::error::{BridgeError, Result};
use crate::{DeviceStatus, Reading, TopicBuilder};

/// How long a publish may wait for room in the MQTT request queue.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

/// Identity of a polled device as presented to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Configured device name.
    pub name: String,
    /// Device address; part of every unique id.
    pub host: String,
    /// Device model / type name.
    pub model: String,
    pub manufacturer: String,
    pub sw_version: Option<String>,
}

impl DeviceIdentity {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        model: impl Into<String>,
        manufacturer: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            model: model.into(),
            manufacturer: manufacturer.into(),
            sw_version: None,
        }
    }

    pub fn with_sw_version(mut self, version: impl Into<String>) -> Self {
        self.sw_version = Some(version.into());
        self
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifiers: vec![format!("{}_{}", slugify(&self.manufacturer), self.host)],
            name: self.name.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            sw_version: self.sw_version.clone(),
        }
    }
}

/// Destination for decoded readings.
///
/// Every call is bounded in time: a slow or unreachable hub shows up as
/// failed publishes, never as a stalled poller.
pub trait StateSink: Send + Sync {
    /// Announce readings not announced before for this device.
    fn publish_discovery(
        &self,
        device: &DeviceIdentity,
        readings: &[Reading],
    ) -> impl Future<Output = PublishStats> + Send;

    /// Publish the current value of every reading.
    fn publish_state(
        &self,
        device: &DeviceIdentity,
        readings: &[Reading],
        timestamp: i64,
    ) -> impl Future<Output = PublishStats> + Send;

    /// Publish the device's availability.
    fn publish_availability(
        &self,
        device: &DeviceIdentity,
        status: DeviceStatus,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<T: StateSink + ?Sized> StateSink for Arc<T> {
    async fn publish_discovery(&self, device: &DeviceIdentity, readings: &[Reading]) -> PublishStats {
        (**self).publish_discovery(device, readings).await
    }

    async fn publish_state(
        &self,
        device: &DeviceIdentity,
        readings: &[Reading],
        timestamp: i64,
    ) -> PublishStats {
        (**self).publish_state(device, readings, timestamp).await
    }

    async fn publish_availability(&self, device: &DeviceIdentity, status: DeviceStatus) -> Result<()> {
        (**self).publish_availability(device, status).await
    }
}

/// Publisher for sending discovery and state messages to the MQTT hub.
///
/// Cheap to clone; all clones share the MQTT client and the set of
/// already-announced readings.
#[derive(Clone)]
pub struct Publisher {
    client: AsyncClient,
    topics: TopicBuilder,
    announced: Arc<Mutex<HashSet<String>>>,
    publish_timeout: Duration,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("topics", &self.topics)
            .field("announced", &self.announced.lock().len())
            .field("publish_timeout", &self.publish_timeout)
            .finish()
    }
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(client: AsyncClient, topics: TopicBuilder) -> Self {
        Self {
            client,
            topics,
            announced: Arc::new(Mutex::new(HashSet::new())),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    /// Set how long one message may wait for room in the request queue.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Get the topic builder.
    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    /// Get the underlying MQTT client.
    pub fn client(&self) -> &AsyncClient {
        &self.client
    }

    /// Hand a message to the event loop.
    ///
    /// Waits while the request queue is full, up to the publish timeout.
    pub async fn publish_raw(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        let request = self
            .client
            .publish(topic, QoS::AtLeastOnce, retain, payload);

        match tokio::time::timeout(self.publish_timeout, request).await {
            Ok(result) => result.map_err(|e| BridgeError::publish(topic, e)),
            Err(_) => Err(BridgeError::publish(
                topic,
                format!("request queue still full after {:?}", self.publish_timeout),
            )),
        }
    }

    /// Publish a JSON value to a topic.
    pub async fn publish_json<T: serde::Serialize>(&self, topic: &str, value: &T, retain: bool) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(topic, payload, retain).await
    }

    /// Build the discovery config for one reading.
    pub fn discovery_payload(&self, device: &DeviceIdentity, reading: &Reading) -> SensorDiscovery {
        let display_name = format!("{}_{}_{}", device.name, device.model, reading.name);
        let object_id = self.topics.object_id(&device.name, &reading.name);

        SensorDiscovery {
            unique_id: unique_id(&device.host, &reading.register, &display_name),
            state_topic: self.topics.state_topic(&device.name, &object_id),
            name: display_name,
            object_id,
            unit_of_measurement: None,
            device_class: None,
            state_class: None,
            availability_topic: Some(self.topics.availability_topic(&device.name)),
            device: device.device_info(),
        }
        .with_unit(&reading.name, &reading.unit)
    }

    /// Number of readings announced so far, across all devices.
    pub fn announced_count(&self) -> usize {
        self.announced.lock().len()
    }
}

impl StateSink for Publisher {
    async fn publish_discovery(&self, device: &DeviceIdentity, readings: &[Reading]) -> PublishStats {
        let mut stats = PublishStats::default();

        for reading in readings {
            let discovery = self.discovery_payload(device, reading);
            let announced = self.announced.lock().contains(&discovery.unique_id);
            if announced {
                continue;
            }

            let topic = self.topics.config_topic(&discovery.object_id);
            match self.publish_json(&topic, &discovery, true).await {
                Ok(()) => {
                    tracing::debug!(topic = %topic, "Published discovery");
                    self.announced.lock().insert(discovery.unique_id);
                    stats.success += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(device = %device.name, error = %e, "Failed to publish discovery");
                }
            }
        }

        stats
    }

    async fn publish_state(
        &self,
        device: &DeviceIdentity,
        readings: &[Reading],
        timestamp: i64,
    ) -> PublishStats {
        let mut stats = PublishStats::default();

        for reading in readings {
            let object_id = self.topics.object_id(&device.name, &reading.name);
            let topic = self.topics.state_topic(&device.name, &object_id);
            let payload = reading.value.to_string();

            match self.publish_raw(&topic, payload.into_bytes(), true).await {
                Ok(()) => {
                    tracing::trace!(topic = %topic, value = %reading.value, "Published state");
                    stats.success += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(device = %device.name, error = %e, "Failed to publish state");
                }
            }
        }

        if let Some(time) = chrono::DateTime::from_timestamp_millis(timestamp) {
            let topic = self.topics.last_update_topic(&device.name);
            match self.publish_raw(&topic, time.to_rfc3339().into_bytes(), true).await {
                Ok(()) => stats.success += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(device = %device.name, error = %e, "Failed to publish last update");
                }
            }
        }

        stats
    }

    async fn publish_availability(&self, device: &DeviceIdentity, status: DeviceStatus) -> Result<()> {
        let Some(payload) = status.availability_payload() else {
            return Ok(());
        };
        let topic = self.topics.availability_topic(&device.name);
        self.publish_raw(&topic, payload.as_bytes().to_vec(), true).await
    }
}

/// Statistics from a batch publish operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of successfully queued messages.
    pub success: usize,
    /// Number of failed publishes.
    pub failed: usize,
}

impl PublishStats {
    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}
