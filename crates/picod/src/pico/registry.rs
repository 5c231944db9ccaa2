use std::collections::BTreeMap;

use super::button::ButtonEvent;

/// Entity domain for the per-light state picod keeps.
pub const APP_DOMAIN: &str = "lutron_pico_5_light";

/// Derive the app entity id for a light, e.g. `light.entryway` becomes
/// `lutron_pico_5_light.entryway`.
///
/// Returns `None` for ids without a `<domain>.<object_id>` shape.
pub fn app_entity_id(light_entity_id: &str) -> Option<String> {
    let (domain, object_id) = light_entity_id.split_once('.')?;
    if domain.is_empty() || object_id.is_empty() {
        return None;
    }
    Some(format!("{}.{}", APP_DOMAIN, object_id))
}

/// A configured remote and the light it controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub device_id: String,
    pub light_entity_id: String,
    pub app_entity_id: String,
}

/// Pico press triggers, one per configured remote.
#[derive(Debug, Clone, Default)]
pub struct TriggerRegistry {
    triggers: BTreeMap<String, Trigger>,
}

impl TriggerRegistry {
    /// Build the registry from a device id -> light entity id mapping.
    ///
    /// Entries whose light entity id is malformed are skipped; config
    /// validation rejects those before this is reached.
    pub fn new<'a>(mapping: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let triggers = mapping
            .into_iter()
            .filter_map(|(device_id, light_entity_id)| {
                let app_entity_id = app_entity_id(light_entity_id)?;
                Some((
                    device_id.clone(),
                    Trigger {
                        device_id: device_id.clone(),
                        light_entity_id: light_entity_id.clone(),
                        app_entity_id,
                    },
                ))
            })
            .collect();

        Self { triggers }
    }

    /// Find the trigger for a button event.
    ///
    /// Matches presses on 5-button Picos from configured devices only.
    pub fn matching(&self, event: &ButtonEvent) -> Option<&Trigger> {
        if !event.is_pico_press() {
            return None;
        }
        self.triggers.get(&event.device_id)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pico::button::ButtonAction;
    use crate::pico::button::ButtonType;
    use crate::pico::button::PICO_5_BUTTON_TYPE;

    fn event(device_id: &str, action: ButtonAction) -> ButtonEvent {
        ButtonEvent {
            serial: None,
            device_type: PICO_5_BUTTON_TYPE.to_string(),
            button_number: None,
            leap_button_number: None,
            device_name: None,
            device_id: device_id.to_string(),
            area_name: None,
            button_type: ButtonType::On,
            action,
        }
    }

    fn registry() -> TriggerRegistry {
        let mapping: BTreeMap<String, String> = [
            ("pico_a".to_string(), "light.entryway".to_string()),
            ("pico_b".to_string(), "light.kitchen.island".to_string()),
        ]
        .into_iter()
        .collect();
        TriggerRegistry::new(&mapping)
    }

    #[test]
    fn test_app_entity_id() {
        assert_eq!(
            app_entity_id("light.entryway").as_deref(),
            Some("lutron_pico_5_light.entryway")
        );
        assert_eq!(
            app_entity_id("light.kitchen.island").as_deref(),
            Some("lutron_pico_5_light.kitchen.island")
        );
        assert_eq!(app_entity_id("entryway"), None);
        assert_eq!(app_entity_id("light."), None);
        assert_eq!(app_entity_id(".entryway"), None);
    }

    #[test]
    fn test_matches_configured_press() {
        let registry = registry();
        assert_eq!(registry.len(), 2);

        let trigger = registry
            .matching(&event("pico_a", ButtonAction::Press))
            .unwrap();
        assert_eq!(trigger.light_entity_id, "light.entryway");
        assert_eq!(trigger.app_entity_id, "lutron_pico_5_light.entryway");
    }

    #[test]
    fn test_ignores_release_and_unknown_devices() {
        let registry = registry();
        assert!(registry
            .matching(&event("pico_a", ButtonAction::Release))
            .is_none());
        assert!(registry
            .matching(&event("pico_unknown", ButtonAction::Press))
            .is_none());
    }

    #[test]
    fn test_ignores_other_device_types() {
        let registry = registry();
        let mut event = event("pico_a", ButtonAction::Press);
        event.device_type = "Pico2Button".to_string();
        assert!(registry.matching(&event).is_none());
    }

    #[test]
    fn test_skips_malformed_light_ids() {
        let mapping: BTreeMap<String, String> =
            [("pico_a".to_string(), "entryway".to_string())].into_iter().collect();
        assert!(TriggerRegistry::new(&mapping).is_empty());
    }
}
