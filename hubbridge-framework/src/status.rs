//! Bridge status reporting.

use rumqttc::{LastWill, QoS};

use crate::Result;
use crate::TopicBuilder;
use crate::publisher::Publisher;

const ONLINE: &str = "online";
const OFFLINE: &str = "offline";

/// Publishes the bridge's own online/offline status.
///
/// The broker publishes the "offline" last will if the bridge disappears
/// without a clean shutdown.
pub struct StatusPublisher {
    publisher: Publisher,
    bridge_name: String,
    version: String,
}

impl StatusPublisher {
    /// Create a new status publisher.
    pub fn new(
        publisher: Publisher,
        bridge_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            bridge_name: bridge_name.into(),
            version: version.into(),
        }
    }

    /// Last will to register when connecting.
    pub fn last_will(topics: &TopicBuilder) -> LastWill {
        LastWill::new(topics.status_topic(), OFFLINE, QoS::AtLeastOnce, true)
    }

    /// Publish "online" status.
    pub async fn publish_running(&self) -> Result<()> {
        tracing::debug!(bridge = %self.bridge_name, version = %self.version, "Publishing online status");
        let topic = self.publisher.topics().status_topic();
        self.publisher.publish_raw(&topic, ONLINE.into(), true).await
    }

    /// Publish "offline" status.
    pub async fn publish_offline(&self) -> Result<()> {
        let topic = self.publisher.topics().status_topic();
        self.publisher.publish_raw(&topic, OFFLINE.into(), true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{AsyncClient, MqttOptions};

    #[test]
    fn test_last_will_topic() {
        let topics = TopicBuilder::new("homeassistant", "atlas_copco");
        let will = StatusPublisher::last_will(&topics);

        assert_eq!(will.topic, "atlas_copco/status");
        assert_eq!(&will.message[..], b"offline");
        assert!(will.retain);
    }

    #[tokio::test]
    async fn test_status_messages_are_queued() {
        let (client, _eventloop) = AsyncClient::new(MqttOptions::new("t", "localhost", 1883), 4);
        let publisher = Publisher::new(client, TopicBuilder::new("homeassistant", "mkv"));
        let status = StatusPublisher::new(publisher, "mkv", "0.2.0");

        assert!(status.publish_running().await.is_ok());
        assert!(status.publish_offline().await.is_ok());
    }
}
