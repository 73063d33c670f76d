//! Configuration for the MKV bridge.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hubbridge_framework::{BridgeConfig, BridgeError, LoggingConfig, MqttConfig};

use crate::catalog::{Catalog, CatalogError, RegisterDescriptor};
use crate::client::DEFAULT_CGI_PATH;
use crate::poller::{MANUFACTURER, SW_VERSION};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid catalog '{device_type}': {source}")]
    Catalog {
        device_type: String,
        #[source]
        source: CatalogError,
    },
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MkvBridgeConfig {
    /// MQTT broker and topic settings
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// MKV-specific settings
    pub mkv: MkvConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MKV controller configuration.
///
/// The four device lists are parallel: entry `i` of each describes device
/// `i`. Each may be a JSON array or a comma-separated string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MkvConfig {
    /// Controller addresses (IP or hostname, optionally with `http://`)
    pub controller_hosts: CsvList,

    /// Device names (used in topics and entity names)
    pub device_names: CsvList,

    /// Device types, e.g. "GA15VS23A"
    pub device_types: CsvList,

    /// Request timeouts in seconds
    pub timeouts: CsvList,

    /// Time between the starts of two cycles, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Upper bound of the random start delay of each device, in seconds
    #[serde(default = "default_start_jitter")]
    pub start_jitter_secs: u64,

    /// Path of the CGI endpoint on the controller
    #[serde(default = "default_cgi_path")]
    pub cgi_path: String,

    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,

    #[serde(default = "default_sw_version")]
    pub sw_version: String,

    /// Additional device types, or replacements for built-in ones
    #[serde(default)]
    pub catalogs: BTreeMap<String, Vec<RegisterDescriptor>>,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_start_jitter() -> u64 {
    4
}

fn default_cgi_path() -> String {
    DEFAULT_CGI_PATH.to_string()
}

fn default_manufacturer() -> String {
    MANUFACTURER.to_string()
}

fn default_sw_version() -> String {
    SW_VERSION.to_string()
}

/// A list given either as an array or as a comma-separated string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ListRepr", into = "Vec<String>")]
pub struct CsvList(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum ListRepr {
    Text(String),
    List(Vec<ListItem>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListItem {
    Text(String),
    Integer(u64),
    Float(f64),
}

impl From<ListRepr> for CsvList {
    fn from(repr: ListRepr) -> Self {
        match repr {
            ListRepr::Text(text) if text.trim().is_empty() => CsvList(Vec::new()),
            ListRepr::Text(text) => CsvList(text.split(',').map(|s| s.trim().to_string()).collect()),
            ListRepr::List(items) => CsvList(
                items
                    .into_iter()
                    .map(|item| match item {
                        ListItem::Text(s) => s.trim().to_string(),
                        ListItem::Integer(n) => n.to_string(),
                        ListItem::Float(n) => n.to_string(),
                    })
                    .collect(),
            ),
        }
    }
}

impl From<CsvList> for Vec<String> {
    fn from(list: CsvList) -> Self {
        list.0
    }
}

impl CsvList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One configured controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub name: String,
    /// Address without scheme.
    pub host: String,
    pub device_type: String,
    /// Bound on one question/answer exchange.
    pub timeout: Duration,
}

impl MkvConfig {
    /// Zip the parallel device lists into device configurations.
    pub fn devices(&self) -> Result<Vec<DeviceConfig>, ConfigError> {
        let count = self.controller_hosts.len();

        if self.device_names.len() != count
            || self.device_types.len() != count
            || self.timeouts.len() != count
        {
            return Err(ConfigError::Validation(format!(
                "Device lists differ in length: {} hosts, {} names, {} types, {} timeouts",
                count,
                self.device_names.len(),
                self.device_types.len(),
                self.timeouts.len()
            )));
        }

        if count == 0 {
            return Err(ConfigError::Validation(
                "At least one device must be configured".to_string(),
            ));
        }

        let mut names = HashSet::with_capacity(count);
        let mut devices = Vec::with_capacity(count);

        for i in 0..count {
            let name = self.device_names.0[i].clone();
            if name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Device {}: name cannot be empty",
                    i + 1
                )));
            }
            if !names.insert(name.clone()) {
                return Err(ConfigError::Validation(format!(
                    "Device name '{}' is used more than once",
                    name
                )));
            }

            let host = strip_scheme(&self.controller_hosts.0[i]);
            if host.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': host cannot be empty",
                    name
                )));
            }

            let device_type = self.device_types.0[i].clone();
            if device_type.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': type cannot be empty",
                    name
                )));
            }

            let timeout = parse_timeout(&self.timeouts.0[i]).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "Device '{}': invalid timeout '{}' (positive number of seconds)",
                    name, self.timeouts.0[i]
                ))
            })?;

            devices.push(DeviceConfig {
                name,
                host,
                device_type,
                timeout,
            });
        }

        Ok(devices)
    }

    /// Built-in catalogs plus the configured ones.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        let mut catalog = Catalog::with_builtin();
        for (device_type, descriptors) in &self.catalogs {
            catalog
                .insert(device_type, descriptors.clone())
                .map_err(|source| ConfigError::Catalog {
                    device_type: device_type.clone(),
                    source,
                })?;
        }
        Ok(catalog)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn start_jitter(&self) -> Duration {
        Duration::from_secs(self.start_jitter_secs)
    }
}

fn strip_scheme(host: &str) -> String {
    let host = host.trim();
    let host = host
        .strip_prefix("http://")
        .or_else(|| host.strip_prefix("https://"))
        .unwrap_or(host);
    host.trim_end_matches('/').to_string()
}

fn parse_timeout(text: &str) -> Option<Duration> {
    let secs: f64 = text.trim().parse().ok()?;
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

impl BridgeConfig for MkvBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> hubbridge_framework::Result<()> {
        if self.mkv.poll_interval_secs == 0 {
            return Err(BridgeError::validation("poll_interval_secs must be at least 1"));
        }
        self.mkv
            .devices()
            .map_err(|e| BridgeError::validation(e.to_string()))?;
        self.mkv
            .catalog()
            .map_err(|e| BridgeError::validation(e.to_string()))?;
        Ok(())
    }
}
