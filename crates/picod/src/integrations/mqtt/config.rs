use serde::Deserialize;

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

fn default_button_event_topic() -> String {
    "lutron_caseta/button_event".to_string()
}

fn default_port() -> u16 {
    1883
}

/// Configuration for the MQTT integration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// MQTT broker hostname or IP address
    pub broker: String,

    /// MQTT broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// MQTT client ID, also used as the availability topic prefix
    pub client_id: String,

    /// Discovery prefix for Zigbee2MQTT lights (default: "homeassistant")
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,

    /// Topic filter for Caseta button events; may contain `+` and `#`
    #[serde(default = "default_button_event_topic")]
    pub button_event_topic: String,

    /// Optional username for authentication
    pub username: Option<String>,

    /// Optional password for authentication
    pub password: Option<String>,
}

impl Config {
    pub fn availability_topic(&self) -> String {
        format!("{}/availability", self.client_id)
    }

    /// Broker credentials; a username without a password logs in with an
    /// empty password.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref()?;
        Some((username, self.password.as_deref().unwrap_or_default()))
    }
}
