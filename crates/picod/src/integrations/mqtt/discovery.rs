use serde::Deserialize;
use serde::Serialize;

/// Accept a string or an integer, returning it as a string.
///
/// Zigbee2MQTT reports `sw_version`/`hw_version` as integers for some
/// devices although the discovery schema says string.
fn deserialize_string_or_int<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct StringOrInt;

    impl<'de> de::Visitor<'de> for StringOrInt {
        type Value = Option<String>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("string, integer, or null")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
    }

    deserializer.deserialize_any(StringOrInt)
}

/// Light discovery payload, as published by Zigbee2MQTT on
/// `{prefix}/light/{node_id}/{object_id}/config`.
///
/// Zigbee2MQTT uses the JSON light schema, so on/off, brightness and colour
/// all travel on `command_topic` as one JSON object.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DiscoveryMessage {
    pub name: Option<String>,

    pub unique_id: Option<String>,

    /// Topic to receive state updates
    pub state_topic: Option<String>,

    /// Topic to send commands
    pub command_topic: Option<String>,

    pub device: Option<DeviceInfo>,

    /// Whether brightness is supported
    pub brightness: Option<bool>,

    /// Scale of the `brightness` value; Zigbee2MQTT uses 254
    pub brightness_scale: Option<u16>,

    /// e.g. `["xy", "color_temp"]`
    pub supported_color_modes: Option<Vec<String>>,

    /// Coldest colour temperature the light supports, in mireds
    pub min_mireds: Option<u16>,

    /// Warmest colour temperature the light supports, in mireds
    pub max_mireds: Option<u16>,

    /// Schema type ("json" for Zigbee2MQTT)
    pub schema: Option<String>,
}

/// Device information from Zigbee2MQTT discovery
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,

    pub name: String,

    pub manufacturer: Option<String>,

    pub model: Option<String>,

    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub sw_version: Option<String>,

    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub hw_version: Option<String>,
}

/// Discovery topic parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryTopic {
    pub component: String,
    pub node_id: String,
    pub object_id: String,
}

/// Parse `{prefix}/{component}/{node_id}/{object_id}/config`.
pub fn parse_discovery_topic(topic: &str, prefix: &str) -> Option<DiscoveryTopic> {
    let without_prefix = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let parts: Vec<&str> = without_prefix.split('/').collect();

    match parts.as_slice() {
        [component, node_id, object_id, "config"] => Some(DiscoveryTopic {
            component: component.to_string(),
            node_id: node_id.to_string(),
            object_id: object_id.to_string(),
        }),
        _ => None,
    }
}
