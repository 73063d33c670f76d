use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Packet,
};

use crate::config::MqttConfig;
use crate::error::{Error, Result};

/// Capacity of the client's outgoing request queue.
const REQUEST_CAPACITY: usize = 64;

/// Back-off between reconnection attempts of the event loop.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// A connected (or still connecting) MQTT session.
///
/// The event loop must be driven (see [`run_event_loop`]) for any publish
/// to reach the broker.
pub struct MqttSession {
    pub client: AsyncClient,
    pub eventloop: EventLoop,
    /// Host the session is bound to.
    pub host: String,
    /// Whether a CONNACK was received during [`connect`].
    pub connected: bool,
}

/// Build client options for one broker host.
pub fn mqtt_options(config: &MqttConfig, host: &str, last_will: Option<LastWill>) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id.clone(), host, config.port);
    options.set_keep_alive(config.keep_alive());

    if config.username.is_some() || config.password.is_some() {
        options.set_credentials(
            config.username.clone().unwrap_or_default(),
            config.password.clone().unwrap_or_default(),
        );
    }

    if let Some(will) = last_will {
        options.set_last_will(will);
    }

    options
}

/// Connect to the first broker that answers.
///
/// The configured host is tried first, then each fallback host. When none
/// acknowledges within the connect timeout, a session bound to the
/// configured host is returned anyway and its event loop keeps retrying.
pub async fn connect(config: &MqttConfig, last_will: Option<LastWill>) -> Result<MqttSession> {
    let hosts = config.candidate_hosts();
    let Some(primary) = hosts.first().cloned() else {
        return Err(Error::Config("No MQTT broker host configured".to_string()));
    };

    for host in &hosts {
        let options = mqtt_options(config, host, last_will.clone());
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        match tokio::time::timeout(config.connect_timeout(), wait_for_connack(&mut eventloop)).await
        {
            Ok(Ok(())) => {
                tracing::info!(host = %host, port = config.port, "Connected to MQTT broker");
                return Ok(MqttSession {
                    client,
                    eventloop,
                    host: host.clone(),
                    connected: true,
                });
            }
            Ok(Err(e)) => {
                tracing::debug!(host = %host, port = config.port, error = %e, "MQTT connect failed");
            }
            Err(_) => {
                tracing::debug!(host = %host, port = config.port, "MQTT connect timed out");
            }
        }
    }

    tracing::warn!(
        host = %primary,
        port = config.port,
        "No MQTT broker answered, will keep retrying in the background"
    );

    let (client, eventloop) = AsyncClient::new(
        mqtt_options(config, &primary, last_will),
        REQUEST_CAPACITY,
    );

    Ok(MqttSession {
        client,
        eventloop,
        host: primary,
        connected: false,
    })
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> std::result::Result<(), String> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(format!("connection refused: {:?}", ack.code))
                };
            }
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// Drive the event loop forever, reconnecting after errors.
pub async fn run_event_loop(mut eventloop: EventLoop, host: String) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!(host = %host, "MQTT session (re)established");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "MQTT connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
