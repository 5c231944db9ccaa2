use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::pico::brightness::brightness_pct_from_raw;
use crate::pico::PicoStates;

/// State of a light entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LightState {
    /// Whether the light is on or off.
    pub on: bool,

    /// Brightness level (0-255), if supported.
    pub brightness: Option<u8>,
}

impl LightState {
    /// Brightness in percent; a light that is off, or reports no brightness, is at 0%.
    pub fn brightness_pct(&self) -> u8 {
        match (self.on, self.brightness) {
            (true, Some(raw)) => brightness_pct_from_raw(raw),
            _ => 0,
        }
    }
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub lights: HashMap<String, LightState>,

    /// Pico automation state, keyed by app entity id
    pub remotes: PicoStates,
}

impl State {
    /// Current brightness of a light in percent, 0 if the light is unknown.
    pub fn light_brightness_pct(&self, entity_id: &str) -> u8 {
        self.lights
            .get(entity_id)
            .map(LightState::brightness_pct)
            .unwrap_or(0)
    }
}
