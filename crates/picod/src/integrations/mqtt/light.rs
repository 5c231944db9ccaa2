use std::error::Error;

use crate::engine::state::LightState;
use crate::engine::LightColor;
use crate::engine::LightCommand;
use crate::integrations::mqtt::discovery::DiscoveryMessage;

/// Engine-side brightness scale
const ENGINE_BRIGHTNESS_SCALE: u16 = 255;

const RGB_COLOR_MODES: [&str; 5] = ["xy", "hs", "rgb", "rgbw", "rgbww"];

fn rescale(value: u64, from: u16, to: u16) -> u64 {
    if from == 0 {
        return 0;
    }
    let value = value.min(u64::from(from));
    (value * u64::from(to) + u64::from(from) / 2) / u64::from(from)
}

fn kelvin_to_mireds(kelvin: u16) -> u16 {
    let kelvin = u32::from(kelvin.max(1));
    ((1_000_000 + kelvin / 2) / kelvin).min(u32::from(u16::MAX)) as u16
}

/// Light entity
#[derive(Debug, Clone)]
pub struct Light {
    /// Entity ID (e.g., "light.0x00124b001234abcd")
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Current state of the light
    pub state: LightState,

    /// Topic to receive state updates
    pub state_topic: String,

    /// Topic to send commands
    pub command_topic: String,

    pub supports_brightness: bool,

    /// Device-side maximum brightness
    pub brightness_scale: u16,

    pub supports_color_temp: bool,

    pub supports_rgb: bool,

    pub min_mireds: Option<u16>,

    pub max_mireds: Option<u16>,
}

impl Light {
    /// Create a Light entity from a Zigbee2MQTT discovery message
    pub fn from_discovery(
        discovery: DiscoveryMessage,
        id: String,
        node_id: String,
    ) -> Result<Self, Box<dyn Error>> {
        let name = discovery
            .name
            .or_else(|| discovery.device.map(|d| d.name))
            .unwrap_or_else(|| format!("Light {}", node_id));

        let state_topic = discovery
            .state_topic
            .ok_or("Missing state_topic in discovery message")?;

        let command_topic = discovery
            .command_topic
            .ok_or("Missing command_topic in discovery message")?;

        let color_modes = discovery.supported_color_modes.unwrap_or_default();
        let supports_color_temp = color_modes.iter().any(|m| m == "color_temp");
        let supports_rgb = color_modes
            .iter()
            .any(|m| RGB_COLOR_MODES.contains(&m.as_str()));

        Ok(Self {
            id,
            name,
            state: LightState::default(),
            state_topic,
            command_topic,
            supports_brightness: discovery.brightness.unwrap_or(false),
            brightness_scale: discovery
                .brightness_scale
                .filter(|scale| *scale > 0)
                .unwrap_or(ENGINE_BRIGHTNESS_SCALE),
            supports_color_temp,
            supports_rgb,
            min_mireds: discovery.min_mireds,
            max_mireds: discovery.max_mireds,
        })
    }

    /// Update the light state from an MQTT payload
    ///
    /// Zigbee2MQTT sends state updates as JSON, e.g.:
    /// {"state": "ON", "brightness": 128}
    pub fn update_state(&mut self, payload: &[u8]) -> Result<(), Box<dyn Error>> {
        let state_update: serde_json::Value = serde_json::from_slice(payload)?;

        if let Some(state_str) = state_update.get("state").and_then(|v| v.as_str()) {
            self.state.on = state_str == "ON";
        }

        if self.supports_brightness {
            if let Some(brightness) = state_update.get("brightness").and_then(|v| v.as_u64()) {
                self.state.brightness = Some(rescale(
                    brightness,
                    self.brightness_scale,
                    ENGINE_BRIGHTNESS_SCALE,
                ) as u8);
            }
        }

        Ok(())
    }

    fn clamp_mireds(&self, mireds: u16) -> u16 {
        let mireds = self.min_mireds.map_or(mireds, |min| mireds.max(min));
        self.max_mireds.map_or(mireds, |max| mireds.min(max))
    }

    /// Build the JSON command payload for a light command.
    ///
    /// Attributes the light does not support are left out.
    pub fn command_payload(&self, command: &LightCommand) -> Result<Vec<u8>, Box<dyn Error>> {
        let mut payload = serde_json::json!({
            "state": if command.on { "ON" } else { "OFF" }
        });

        if command.on {
            if let (true, Some(brightness)) = (self.supports_brightness, command.brightness) {
                payload["brightness"] = serde_json::json!(rescale(
                    u64::from(brightness),
                    ENGINE_BRIGHTNESS_SCALE,
                    self.brightness_scale,
                ));
            }

            match command.color {
                Some(LightColor::ColorTemp { kelvin }) if self.supports_color_temp => {
                    payload["color_temp"] =
                        serde_json::json!(self.clamp_mireds(kelvin_to_mireds(kelvin)));
                }
                Some(LightColor::Rgb { r, g, b }) if self.supports_rgb => {
                    payload["color"] = serde_json::json!({ "r": r, "g": g, "b": b });
                }
                Some(color) => {
                    tracing::debug!("{} does not support {:?}, ignoring colour", self.id, color);
                }
                None => {}
            }
        }

        Ok(serde_json::to_vec(&payload)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn discovery() -> DiscoveryMessage {
        DiscoveryMessage {
            name: Some("Test Light".to_string()),
            unique_id: Some("test_light".to_string()),
            state_topic: Some("zigbee2mqtt/light".to_string()),
            command_topic: Some("zigbee2mqtt/light/set".to_string()),
            brightness: Some(true),
            brightness_scale: Some(254),
            supported_color_modes: Some(vec!["xy".to_string(), "color_temp".to_string()]),
            min_mireds: Some(153),
            max_mireds: Some(370),
            schema: Some("json".to_string()),
            ..DiscoveryMessage::default()
        }
    }

    fn light(discovery: DiscoveryMessage) -> Light {
        Light::from_discovery(discovery, "light.test".to_string(), "test_node".to_string())
            .unwrap()
    }

    fn payload(light: &Light, command: &LightCommand) -> serde_json::Value {
        serde_json::from_slice(&light.command_payload(command).unwrap()).unwrap()
    }

    #[test]
    fn test_name_falls_back_to_device() {
        let mut msg: DiscoveryMessage = serde_json::from_value(json!({
            "state_topic": "zigbee2mqtt/hallway",
            "command_topic": "zigbee2mqtt/hallway/set",
            "device": {"identifiers": ["zigbee2mqtt_0x01"], "name": "Hallway"}
        }))
        .unwrap();
        assert_eq!(light(msg.clone()).name, "Hallway");

        msg.device = None;
        assert_eq!(light(msg).name, "Light test_node");
    }

    #[test]
    fn test_from_discovery_requires_topics() {
        let mut msg = discovery();
        msg.command_topic = None;
        assert!(
            Light::from_discovery(msg, "light.test".to_string(), "node".to_string()).is_err()
        );
    }

    #[test]
    fn test_update_state_rescales_brightness() {
        let mut light = light(discovery());

        light
            .update_state(br#"{"state": "ON", "brightness": 254}"#)
            .unwrap();
        assert!(light.state.on);
        assert_eq!(light.state.brightness, Some(255));

        light
            .update_state(br#"{"state": "OFF", "brightness": 127}"#)
            .unwrap();
        assert!(!light.state.on);
        assert_eq!(light.state.brightness, Some(128));
    }

    #[test]
    fn test_off_command() {
        let light = light(discovery());
        assert_eq!(payload(&light, &LightCommand::off()), json!({"state": "OFF"}));
    }

    #[test]
    fn test_brightness_command() {
        let light = light(discovery());
        let command = LightCommand::on().with_brightness_pct(100);
        assert_eq!(
            payload(&light, &command),
            json!({"state": "ON", "brightness": 254})
        );
    }

    #[test]
    fn test_color_temp_command_is_clamped() {
        let light = light(discovery());

        let command = LightCommand::on().with_color(LightColor::ColorTemp { kelvin: 3500 });
        assert_eq!(
            payload(&light, &command),
            json!({"state": "ON", "color_temp": 286})
        );

        // 2500 K is 400 mireds, warmer than this light goes
        let command = LightCommand::on().with_color(LightColor::ColorTemp { kelvin: 2500 });
        assert_eq!(
            payload(&light, &command),
            json!({"state": "ON", "color_temp": 370})
        );
    }

    #[test]
    fn test_rgb_command() {
        let light = light(discovery());
        let command = LightCommand::on()
            .with_brightness_pct(100)
            .with_color(LightColor::Rgb { r: 255, g: 0, b: 0 });
        assert_eq!(
            payload(&light, &command),
            json!({"state": "ON", "brightness": 254, "color": {"r": 255, "g": 0, "b": 0}})
        );
    }

    #[test]
    fn test_unsupported_attributes_dropped() {
        let mut msg = discovery();
        msg.brightness = None;
        msg.supported_color_modes = Some(vec!["onoff".to_string()]);
        let light = light(msg);

        let command = LightCommand::on()
            .with_brightness_pct(50)
            .with_color(LightColor::Rgb { r: 0, g: 0, b: 255 });
        assert_eq!(payload(&light, &command), json!({"state": "ON"}));
    }
}
