//! Lutron Pico 5-button remote automation.
//!
//! Each configured remote controls one light:
//! - `on` / `off` turn the light on or off
//! - `stop` (the middle button) cycles through scene presets
//! - `raise` / `lower` step the brightness up or down
//!
//! The engine feeds button events through [`PicoAutomation::handle_press`],
//! which is pure: it returns the light command to send and the per-light
//! state to store.

pub mod brightness;
pub mod button;
pub mod registry;
pub mod scene;
pub mod store;

use std::time::SystemTime;

use tracing::debug;

pub use brightness::Direction;
pub use button::ButtonEvent;
pub use button::ButtonType;
pub use registry::Trigger;
pub use registry::TriggerRegistry;
pub use scene::SceneColor;
pub use scene::SceneCycle;
pub use scene::ScenePreset;
pub use store::PicoState;
pub use store::PicoStates;

use crate::engine::LightColor;
use crate::engine::LightCommand;

pub const DEFAULT_BRIGHTNESS_STEP_PCT: u8 = 25;

/// Result of handling one press: what to send and what to remember.
#[derive(Debug, Clone, PartialEq)]
pub struct PressOutcome {
    pub entity_id: String,
    pub command: LightCommand,
    pub state: PicoState,
}

/// The Pico automation: trigger table plus the behaviour shared by all remotes.
#[derive(Debug, Clone)]
pub struct PicoAutomation {
    registry: TriggerRegistry,
    scenes: SceneCycle,
    brightness_step_pct: u8,
}

impl PicoAutomation {
    pub fn new(registry: TriggerRegistry, scenes: SceneCycle, brightness_step_pct: u8) -> Self {
        Self {
            registry,
            scenes,
            brightness_step_pct: brightness_step_pct.max(1),
        }
    }

    pub fn from_config(cfg: &crate::config::PicoConfig) -> Self {
        let mapping = cfg
            .light_mapping
            .iter()
            .map(|(device_id, remote)| (device_id, &remote.light_entity_id));
        Self::new(
            TriggerRegistry::new(mapping),
            cfg.scenes.clone(),
            cfg.brightness_step_pct,
        )
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    pub fn scenes(&self) -> &SceneCycle {
        &self.scenes
    }

    /// Decide what a button press does to its light.
    ///
    /// `previous` is the state stored for the light by the last press, and
    /// `current_brightness_pct` the light's brightness now (0 when off).
    pub fn handle_press(
        &self,
        trigger: &Trigger,
        button: ButtonType,
        previous: Option<&PicoState>,
        current_brightness_pct: u8,
        now: SystemTime,
    ) -> PressOutcome {
        let mut scene_index = None;

        let command = match button {
            ButtonType::On => LightCommand::on(),
            ButtonType::Off => LightCommand::off(),
            ButtonType::Stop => {
                let (index, preset) = self
                    .scenes
                    .next(previous.and_then(|state| state.scene_index));
                debug!(
                    "{}: switching to scene {} ({:?})",
                    trigger.light_entity_id, index, preset
                );
                scene_index = Some(index);
                LightCommand::on()
                    .with_brightness_pct(preset.brightness_pct)
                    .with_color(LightColor::from(preset.color))
            }
            ButtonType::Raise | ButtonType::Lower => {
                let direction = if button == ButtonType::Raise {
                    Direction::Up
                } else {
                    Direction::Down
                };
                let desired = brightness::desired_brightness_pct(
                    direction,
                    current_brightness_pct,
                    self.brightness_step_pct,
                );
                debug!(
                    "{}: dimming {:?} from {}% to {}%",
                    trigger.light_entity_id, direction, current_brightness_pct, desired
                );
                if desired == brightness::BRIGHTNESS_PCT_MIN {
                    LightCommand::off()
                } else {
                    LightCommand::on().with_brightness_pct(desired)
                }
            }
        };

        PressOutcome {
            entity_id: trigger.light_entity_id.clone(),
            command,
            state: PicoState {
                last_action: button,
                scene_index,
                last_update: store::unix_timestamp(now),
            },
        }
    }
}

impl From<SceneColor> for LightColor {
    fn from(color: SceneColor) -> Self {
        match color {
            SceneColor::ColorTemp { kelvin } => LightColor::ColorTemp { kelvin },
            SceneColor::Rgb { r, g, b } => LightColor::Rgb { r, g, b },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;
    use std::time::UNIX_EPOCH;

    use super::*;

    fn automation() -> PicoAutomation {
        let mapping: BTreeMap<String, String> =
            [("pico_a".to_string(), "light.entryway".to_string())]
                .into_iter()
                .collect();
        PicoAutomation::new(
            TriggerRegistry::new(&mapping),
            SceneCycle::default(),
            DEFAULT_BRIGHTNESS_STEP_PCT,
        )
    }

    fn trigger(automation: &PicoAutomation) -> Trigger {
        automation.registry().iter().next().unwrap().clone()
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_on_and_off() {
        let automation = automation();
        let trigger = trigger(&automation);

        let on = automation.handle_press(&trigger, ButtonType::On, None, 0, at(10));
        assert_eq!(on.entity_id, "light.entryway");
        assert_eq!(on.command, LightCommand::on());
        assert_eq!(on.state.last_action, ButtonType::On);
        assert_eq!(on.state.last_update, 10.0);

        let off = automation.handle_press(&trigger, ButtonType::Off, Some(&on.state), 100, at(11));
        assert_eq!(off.command, LightCommand::off());
        assert_eq!(off.state.last_action, ButtonType::Off);
    }

    #[test]
    fn test_stop_cycles_scenes() {
        let automation = automation();
        let trigger = trigger(&automation);

        let first = automation.handle_press(&trigger, ButtonType::Stop, None, 0, at(1));
        assert_eq!(first.state.scene_index, Some(0));
        assert_eq!(
            first.command,
            LightCommand::on()
                .with_brightness_pct(100)
                .with_color(LightColor::ColorTemp { kelvin: 3500 })
        );

        let mut previous = first.state;
        let mut indices = vec![0];
        for _ in 0..5 {
            let next =
                automation.handle_press(&trigger, ButtonType::Stop, Some(&previous), 100, at(2));
            indices.push(next.state.scene_index.unwrap());
            previous = next.state;
        }
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 0]);
    }

    #[test]
    fn test_stop_applies_rgb_scene() {
        let automation = automation();
        let trigger = trigger(&automation);
        let previous = PicoState {
            last_action: ButtonType::Stop,
            scene_index: Some(1),
            last_update: 0.0,
        };

        let outcome =
            automation.handle_press(&trigger, ButtonType::Stop, Some(&previous), 100, at(1));
        assert_eq!(outcome.state.scene_index, Some(2));
        assert_eq!(
            outcome.command.color,
            Some(LightColor::Rgb { r: 255, g: 0, b: 0 })
        );
    }

    #[test]
    fn test_other_buttons_reset_scene_cycle() {
        let automation = automation();
        let trigger = trigger(&automation);
        let previous = PicoState {
            last_action: ButtonType::Stop,
            scene_index: Some(3),
            last_update: 0.0,
        };

        let on = automation.handle_press(&trigger, ButtonType::On, Some(&previous), 100, at(1));
        assert_eq!(on.state.scene_index, None);

        let stop = automation.handle_press(&trigger, ButtonType::Stop, Some(&on.state), 100, at(2));
        assert_eq!(stop.state.scene_index, Some(0));
    }

    #[test]
    fn test_raise_and_lower() {
        let automation = automation();
        let trigger = trigger(&automation);

        let lower = automation.handle_press(&trigger, ButtonType::Lower, None, 60, at(1));
        assert_eq!(lower.command, LightCommand::on().with_brightness_pct(50));
        assert_eq!(lower.state.last_action, ButtonType::Lower);
        assert_eq!(lower.state.scene_index, None);

        let raise = automation.handle_press(&trigger, ButtonType::Raise, None, 0, at(1));
        assert_eq!(raise.command, LightCommand::on().with_brightness_pct(1));

        let raise = automation.handle_press(&trigger, ButtonType::Raise, None, 100, at(1));
        assert_eq!(raise.command, LightCommand::on().with_brightness_pct(100));
    }

    #[test]
    fn test_lower_at_minimum_turns_off() {
        let automation = automation();
        let trigger = trigger(&automation);

        let lower = automation.handle_press(&trigger, ButtonType::Lower, None, 1, at(1));
        assert_eq!(lower.command, LightCommand::off());

        let lower = automation.handle_press(&trigger, ButtonType::Lower, None, 0, at(1));
        assert_eq!(lower.command, LightCommand::off());
    }
}
