use std::collections::BTreeMap;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use super::button::ButtonType;

/// What picod remembers about a light between Pico presses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PicoState {
    pub last_action: ButtonType,

    /// Index into the scene list of the last scene applied.
    /// Only set when the last press was `stop`.
    pub scene_index: Option<usize>,

    /// Seconds since the Unix epoch
    pub last_update: f64,
}

/// Per-light Pico state keyed by app entity id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PicoStates {
    entries: BTreeMap<String, PicoState>,
}

impl PicoStates {
    pub fn get(&self, app_entity_id: &str) -> Option<&PicoState> {
        self.entries.get(app_entity_id)
    }

    /// Replace the state stored for a light, creating it on first use.
    pub fn record(&mut self, app_entity_id: String, state: PicoState) {
        self.entries.insert(app_entity_id, state);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PicoState)> {
        self.entries.iter()
    }
}

pub fn unix_timestamp(now: SystemTime) -> f64 {
    now.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_record_replaces_previous_state() {
        let mut states = PicoStates::default();
        assert!(states.get("lutron_pico_5_light.entryway").is_none());

        states.record(
            "lutron_pico_5_light.entryway".to_string(),
            PicoState {
                last_action: ButtonType::Stop,
                scene_index: Some(2),
                last_update: 1.0,
            },
        );
        states.record(
            "lutron_pico_5_light.entryway".to_string(),
            PicoState {
                last_action: ButtonType::Off,
                scene_index: None,
                last_update: 2.0,
            },
        );

        assert_eq!(states.len(), 1);
        let state = states.get("lutron_pico_5_light.entryway").unwrap();
        assert_eq!(state.last_action, ButtonType::Off);
        assert_eq!(state.scene_index, None);
    }

    #[test]
    fn test_serializes_as_map() {
        let mut states = PicoStates::default();
        states.record(
            "lutron_pico_5_light.den".to_string(),
            PicoState {
                last_action: ButtonType::Stop,
                scene_index: Some(1),
                last_update: 1700000000.5,
            },
        );

        insta::assert_snapshot!(
            serde_json::to_string(&states).unwrap(),
            @r#"{"lutron_pico_5_light.den":{"last_action":"stop","scene_index":1,"last_update":1700000000.5}}"#
        );
    }

    #[test]
    fn test_unix_timestamp() {
        let now = UNIX_EPOCH + Duration::from_millis(1500);
        assert_eq!(unix_timestamp(now), 1.5);
    }
}
