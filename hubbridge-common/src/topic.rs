/// Default Home Assistant discovery prefix.
pub const DISCOVERY_PREFIX: &str = "homeassistant";

/// Builder for the MQTT topics a bridge publishes to.
///
/// Topics follow the patterns:
/// - `<discovery_prefix>/sensor/<object_id>/config`
/// - `<state_base>/<device>/<object_id>/state`
/// - `<state_base>/<device>/availability`
/// - `<state_base>/<device>/last_update`
/// - `<state_base>/status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    discovery_prefix: String,
    state_base: String,
}

impl TopicBuilder {
    /// Create a builder. Leading and trailing slashes are trimmed.
    pub fn new(discovery_prefix: &str, state_base: &str) -> Self {
        let discovery_prefix = match discovery_prefix.trim().trim_matches('/') {
            "" => DISCOVERY_PREFIX,
            prefix => prefix,
        };
        Self {
            discovery_prefix: discovery_prefix.to_string(),
            state_base: state_base.trim().trim_matches('/').to_string(),
        }
    }

    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    pub fn state_base(&self) -> &str {
        &self.state_base
    }

    /// Object id of a reading; the device name is included for uniqueness.
    ///
    /// # Example
    /// ```
    /// use hubbridge_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("homeassistant", "atlas_copco");
    /// assert_eq!(topics.object_id("GA 15", "VSD 1-20"), "ga_15_vsd_1_20");
    /// ```
    pub fn object_id(&self, device: &str, reading: &str) -> String {
        slugify(&format!("{}_{}", device, reading))
    }

    /// Build the state topic for a reading.
    ///
    /// # Example
    /// ```
    /// use hubbridge_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("homeassistant", "atlas_copco/");
    /// assert_eq!(
    ///     topics.state_topic("Shop", "shop_flow"),
    ///     "atlas_copco/shop/shop_flow/state"
    /// );
    /// ```
    pub fn state_topic(&self, device: &str, object_id: &str) -> String {
        format!("{}/{}/{}/state", self.state_base, slugify(device), object_id)
    }

    /// Build the discovery config topic for a sensor.
    pub fn config_topic(&self, object_id: &str) -> String {
        format!("{}/sensor/{}/config", self.discovery_prefix, object_id)
    }

    /// Build the per-device availability topic.
    pub fn availability_topic(&self, device: &str) -> String {
        format!("{}/{}/availability", self.state_base, slugify(device))
    }

    /// Build the per-device topic carrying the time of the last published cycle.
    pub fn last_update_topic(&self, device: &str) -> String {
        format!("{}/{}/last_update", self.state_base, slugify(device))
    }

    /// Build the bridge status topic (also used as last will).
    pub fn status_topic(&self) -> String {
        format!("{}/status", self.state_base)
    }
}

/// Lowercase a name and collapse every run of characters outside
/// `[a-z0-9_]` into a single underscore.
///
/// # Example
/// ```
/// use hubbridge_common::topic::slugify;
///
/// assert_eq!(slugify(" Element Outlet "), "element_outlet");
/// assert_eq!(slugify("192.168.1.20"), "192_168_1_20");
/// ```
pub fn slugify(s: &str) -> String {
    let lowered = s.trim().to_lowercase().replace(' ', "_");
    let mut out = String::with_capacity(lowered.len());
    let mut in_run = false;

    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    out
}

/// Stable identifier for a reading, derived from the device address,
/// register id and display name.
pub fn unique_id(host: &str, register: &str, display_name: &str) -> String {
    slugify(&format!("{}_{}_{}", host, register, display_name))
}
