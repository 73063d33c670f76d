//! MQTT bridge for Atlas Copco Mk5s Touch ("MKV") compressor controllers.
//!
//! This bridge polls MKV controllers over their HTTP CGI interface, decodes
//! the raw register answer with a per-device-type catalog, and publishes
//! the readings to Home Assistant via MQTT discovery.
//!
//! # Topics
//!
//! ```text
//! homeassistant/sensor/<object_id>/config
//! atlas_copco/<device>/<object_id>/state
//! atlas_copco/<device>/availability
//! ```
//!
//! Where:
//! - `<device>` - Slugified device name from configuration
//! - `<object_id>` - Slug of device name and reading name, e.g. `shop_running_hours`

pub mod catalog;
pub mod client;
pub mod codec;
pub mod config;
pub mod cyclelog;
pub mod formula;
pub mod poller;
pub mod scheduler;
