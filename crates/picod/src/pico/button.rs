use serde::Deserialize;
use serde::Serialize;
use strum::AsRefStr;
use strum::Display;
use strum::EnumString;

/// Device type reported by the Caseta bridge for the 5-button Pico remote.
pub const PICO_5_BUTTON_TYPE: &str = "Pico3ButtonRaiseLower";

/// Semantic meaning of a Pico button.
///
/// The middle button is reported as `stop`; picod uses it to cycle scenes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ButtonType {
    On,
    Raise,
    Stop,
    Lower,
    Off,
}

/// What happened to the button.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ButtonAction {
    Press,
    Release,
}

/// A button event from a Caseta remote.
///
/// Mirrors the data of Home Assistant's `lutron_caseta_button_event`, e.g.:
///
/// ```json
/// {
///   "serial": 48582338,
///   "type": "Pico3ButtonRaiseLower",
///   "button_number": 4,
///   "leap_button_number": 2,
///   "device_name": "Recessed Light",
///   "device_id": "eb9d6926898607fe50f57cfd84e6aec0",
///   "area_name": "Entryway",
///   "button_type": "off",
///   "action": "press"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonEvent {
    pub serial: Option<u64>,

    #[serde(rename = "type")]
    pub device_type: String,

    pub button_number: Option<u8>,

    pub leap_button_number: Option<u8>,

    pub device_name: Option<String>,

    pub device_id: String,

    pub area_name: Option<String>,

    pub button_type: ButtonType,

    pub action: ButtonAction,
}

impl ButtonEvent {
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Whether this is a press on a 5-button Pico.
    pub fn is_pico_press(&self) -> bool {
        self.device_type == PICO_5_BUTTON_TYPE && self.action == ButtonAction::Press
    }
}
