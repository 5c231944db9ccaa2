//! Type-safe message system for picod
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use serde::Serialize;

use crate::pico::brightness::brightness_raw_from_pct;
use crate::pico::ButtonEvent;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        integration_name: String,
    },

    /// An entity was removed (device unplugged, etc.)
    EntityRemoved { entity_id: String },

    /// A light's state changed
    LightStateChanged {
        entity_id: String,
        on: bool,
        brightness: Option<u8>,
    },

    /// A remote control button was pressed or released
    ButtonPressed(ButtonEvent),
}

/// Colour to apply when turning a light on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LightColor {
    ColorTemp { kelvin: u16 },
    Rgb { r: u8, g: u8, b: u8 },
}

/// Desired light state. Fields left as `None` are not changed on the light.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LightCommand {
    pub on: bool,

    /// Brightness level (0-255)
    pub brightness: Option<u8>,

    pub color: Option<LightColor>,
}

impl LightCommand {
    pub fn on() -> Self {
        Self {
            on: true,
            ..Self::default()
        }
    }

    pub fn off() -> Self {
        Self::default()
    }

    pub fn with_brightness_pct(mut self, pct: u8) -> Self {
        self.brightness = Some(brightness_raw_from_pct(pct));
        self
    }

    pub fn with_color(mut self, color: LightColor) -> Self {
        self.color = Some(color);
        self
    }
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone, PartialEq)]
pub enum ToIntegrationMessage {
    /// Command to change a light's state
    LightCommand {
        entity_id: String,
        command: LightCommand,
    },
}

impl ToIntegrationMessage {
    /// Entity the message is addressed to, used for routing.
    pub fn entity_id(&self) -> &str {
        match self {
            ToIntegrationMessage::LightCommand { entity_id, .. } => entity_id,
        }
    }
}
