use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// MQTT broker connection and topic layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host. A leading `mqtt://` or `mqtts://` is ignored.
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional username.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password.
    #[serde(default)]
    pub password: Option<String>,

    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Home Assistant discovery prefix.
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,

    /// Base topic for state messages.
    #[serde(default = "default_state_base_topic")]
    pub state_base_topic: String,

    /// Hosts tried, in order, when the configured host does not answer.
    #[serde(default = "default_fallback_hosts")]
    pub fallback_hosts: Vec<String>,

    /// Seconds to wait for CONNACK from each candidate host.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// MQTT keep-alive in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "hubbridge".to_string()
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

fn default_state_base_topic() -> String {
    "atlas_copco".to_string()
}

fn default_fallback_hosts() -> Vec<String> {
    vec![
        "127.0.0.1".to_string(),
        "localhost".to_string(),
        "core-mosquitto".to_string(),
    ]
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_keep_alive_secs() -> u64 {
    30
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            client_id: default_client_id(),
            discovery_prefix: default_discovery_prefix(),
            state_base_topic: default_state_base_topic(),
            fallback_hosts: default_fallback_hosts(),
            connect_timeout_secs: default_connect_timeout_secs(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl MqttConfig {
    /// Configured host with any URL scheme stripped.
    pub fn broker_host(&self) -> &str {
        let host = self.host.trim();
        let lower = host.to_ascii_lowercase();
        for scheme in ["mqtts://", "mqtt://"] {
            if lower.starts_with(scheme) {
                return &host[scheme.len()..];
            }
        }
        host
    }

    /// Hosts to try in order, without duplicates or blanks.
    pub fn candidate_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        let primary = std::iter::once(self.broker_host());
        for host in primary.chain(self.fallback_hosts.iter().map(|h| h.trim())) {
            if !host.is_empty() && !hosts.iter().any(|h| h == host) {
                hosts.push(host.to_string());
            }
        }
        hosts
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default)]
        mqtt: MqttConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_parse_mqtt_config() {
        let json5 = r#"
        {
            mqtt: {
                host: "mqtt://broker.lan",
                port: 1884,
                username: "ha",
                password: "secret",
                state_base_topic: "compressors/",
            },
            logging: {
                level: "debug",
            },
        }
        "#;

        let config: Sample = parse_config(json5).unwrap();

        assert_eq!(config.mqtt.broker_host(), "broker.lan");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.mqtt.username.as_deref(), Some("ha"));
        assert_eq!(config.mqtt.discovery_prefix, "homeassistant");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_default_config() {
        let config: Sample = parse_config("{}").unwrap();

        assert_eq!(config.mqtt.host, "127.0.0.1");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.state_base_topic, "atlas_copco");
        assert_eq!(config.mqtt.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_candidate_hosts_deduplicated() {
        let config = MqttConfig {
            host: "MQTTS://localhost".to_string(),
            ..MqttConfig::default()
        };

        assert_eq!(
            config.candidate_hosts(),
            vec!["localhost", "127.0.0.1", "core-mosquitto"]
        );
    }

    #[test]
    fn test_json_logging_format() {
        let json5 = r#"{ logging: { level: "debug", format: "json" } }"#;
        let config: Sample = parse_config(json5).unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
    }
}
