use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::event::Event;
use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::FromIntegrationMessage;
use super::message::LightCommand;
use super::message::ToIntegrationMessage;
use super::state::LightState;
use super::state::State;
use crate::engine::IntegrationContext;
use crate::pico::ButtonEvent;
use crate::pico::PicoAutomation;

/// picod engine
///
/// This structure handles the flow of events, applying the Pico automation to
/// them, sending commands to the correct integration, and maintaining a view
/// of the world with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Remote -> light triggers and the press behaviour
    pico: PicoAutomation,

    /// Map of entity_id -> integration name for routing messages
    entity_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (for commands)
    integration_channels: HashMap<String, ToIntegrationSender>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: Vec<JoinHandle<()>>,
}

/// Capacity for the integration→engine message channel
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

impl Engine {
    pub fn new(pico: PicoAutomation) -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            pico,
            entity_integration_map: std::sync::Mutex::new(HashMap::new()),
            integration_channels: HashMap::new(),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: Vec::new(),
        }
    }

    /// Build the engine and its Pico automation from configuration.
    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self::new(PicoAutomation::from_config(&cfg.pico))
    }

    pub fn pico(&self) -> &PicoAutomation {
        &self.pico
    }

    /// Register any configured integrations.
    pub fn register_integrations_from_config(&mut self, cfg: &crate::config::Config) {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&mut self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        self.integration_channels
            .insert(name.clone(), to_integration_tx);

        let handle = tokio::spawn(async move {
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        self.integration_handles.push(handle);
    }

    /// Send a command to the integration that owns its entity.
    pub fn send_command(&self, msg: ToIntegrationMessage) -> Result<(), Box<dyn Error + Send>> {
        let integration_name = {
            let map = self
                .entity_integration_map
                .lock()
                .map_err(|e| -> Box<dyn Error + Send> {
                    Box::new(std::io::Error::other(e.to_string()))
                })?;

            map.get(msg.entity_id())
                .cloned()
                .ok_or_else(|| -> Box<dyn Error + Send> {
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("No integration found for entity: {}", msg.entity_id()),
                    ))
                })?
        };

        let tx = self.integration_channels.get(&integration_name).ok_or_else(
            || -> Box<dyn Error + Send> {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Integration channel not found: {}", integration_name),
                ))
            },
        )?;

        tx.send(msg)
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })
    }

    /// Send a light command to control a light entity
    pub fn send_light_command(
        &self,
        entity_id: String,
        command: LightCommand,
    ) -> Result<(), Box<dyn Error + Send>> {
        self.send_command(ToIntegrationMessage::LightCommand { entity_id, command })
    }

    /// Run the engine's main event loop
    ///
    /// Events are handled one at a time, each to completion.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!(
            "Engine starting with {} Pico trigger(s)",
            self.pico.registry().len()
        );

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            if let Err(e) = self.handle_event(msg).await {
                warn!("Error handling event: {}", e);
            }
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    fn update_state(&self, f: impl FnOnce(&mut State)) {
        let mut state = State::clone(&self.state.load());
        f(&mut state);
        self.state.store(Arc::new(state));
    }

    /// Handle an event from an integration
    async fn handle_event(&self, msg: FromIntegrationMessage) -> Result<(), Box<dyn Error + Send>> {
        let event = match msg {
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                integration_name,
            } => {
                info!(
                    "Entity discovered: {} (from {})",
                    entity_id, integration_name
                );

                // State is not populated until the first state-change message arrives.
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.insert(entity_id, integration_name);
                }
                return Ok(());
            }
            FromIntegrationMessage::EntityRemoved { entity_id } => {
                info!("Entity removed: {}", entity_id);

                self.update_state(|state| {
                    state.lights.remove(&entity_id);
                });

                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.remove(&entity_id);
                }
                return Ok(());
            }
            FromIntegrationMessage::LightStateChanged {
                entity_id,
                on,
                brightness,
            } => {
                let light_state = LightState { on, brightness };
                info!(
                    "Light state changed: {} -> on={}, brightness={:?}",
                    entity_id, on, brightness
                );

                self.update_state(|state| {
                    state.lights.insert(entity_id.clone(), light_state.clone());
                });

                Event::LightStateChanged {
                    entity_id,
                    state: light_state,
                }
            }
            FromIntegrationMessage::ButtonPressed(button) => Event::ButtonPressed(button),
        };

        self.apply_automations(event);
        Ok(())
    }

    fn apply_automations(&self, event: Event) {
        match event {
            Event::ButtonPressed(button) => self.handle_button(&button),
            Event::LightStateChanged { .. } => {}
        }
    }

    /// Run the Pico automation for a button event.
    ///
    /// Light commands are fire-and-forget: a command that cannot be routed is
    /// logged and the press is still recorded.
    fn handle_button(&self, button: &ButtonEvent) {
        let Some(trigger) = self.pico.registry().matching(button) else {
            debug!(
                "Ignoring {} {} from {} ({})",
                button.button_type, button.action, button.device_id, button.device_type
            );
            return;
        };

        let snapshot = self.state.load();
        let outcome = self.pico.handle_press(
            trigger,
            button.button_type,
            snapshot.remotes.get(&trigger.app_entity_id),
            snapshot.light_brightness_pct(&trigger.light_entity_id),
            SystemTime::now(),
        );

        info!(
            "Pico {} pressed {} -> {}: {:?}",
            trigger.device_id, button.button_type, outcome.entity_id, outcome.command
        );

        if let Err(e) = self.send_light_command(outcome.entity_id, outcome.command) {
            warn!("Failed to send light command: {}", e);
        }

        let app_entity_id = trigger.app_entity_id.clone();
        self.update_state(|state| state.remotes.record(app_entity_id, outcome.state));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::pico::button::ButtonAction;
    use crate::pico::button::PICO_5_BUTTON_TYPE;
    use crate::pico::ButtonType;
    use crate::pico::SceneCycle;
    use crate::pico::TriggerRegistry;
    use crate::pico::DEFAULT_BRIGHTNESS_STEP_PCT;

    /// Integration that forwards every command to a test channel.
    struct RecordingIntegration {
        commands: mpsc::UnboundedSender<ToIntegrationMessage>,
    }

    #[async_trait]
    impl Integration for RecordingIntegration {
        fn name(&self) -> &str {
            "recording"
        }

        async fn setup(&mut self, _tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }

        async fn handle_message(
            &mut self,
            msg: ToIntegrationMessage,
        ) -> Result<(), Box<dyn Error + Send>> {
            let _ = self.commands.send(msg);
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }
    }

    fn engine() -> (Engine, mpsc::UnboundedReceiver<ToIntegrationMessage>) {
        let mapping: std::collections::BTreeMap<String, String> =
            [("pico_a".to_string(), "light.entryway".to_string())]
                .into_iter()
                .collect();
        let pico = PicoAutomation::new(
            TriggerRegistry::new(&mapping),
            SceneCycle::default(),
            DEFAULT_BRIGHTNESS_STEP_PCT,
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let mut engine = Engine::new(pico);
        engine.register_integration(
            "recording".to_string(),
            Box::new(RecordingIntegration { commands: tx }),
        );
        (engine, rx)
    }

    fn press(device_id: &str, button_type: ButtonType) -> FromIntegrationMessage {
        FromIntegrationMessage::ButtonPressed(ButtonEvent {
            serial: None,
            device_type: PICO_5_BUTTON_TYPE.to_string(),
            button_number: None,
            leap_button_number: None,
            device_name: None,
            device_id: device_id.to_string(),
            area_name: None,
            button_type,
            action: ButtonAction::Press,
        })
    }

    async fn next_command(
        rx: &mut mpsc::UnboundedReceiver<ToIntegrationMessage>,
    ) -> ToIntegrationMessage {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for command")
            .expect("command channel closed")
    }

    async fn discover_entryway(engine: &Engine) {
        engine
            .handle_event(FromIntegrationMessage::EntityDiscovered {
                entity_id: "light.entryway".to_string(),
                integration_name: "recording".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lower_uses_current_brightness() {
        let (engine, mut rx) = engine();
        discover_entryway(&engine).await;

        engine
            .handle_event(FromIntegrationMessage::LightStateChanged {
                entity_id: "light.entryway".to_string(),
                on: true,
                brightness: Some(153),
            })
            .await
            .unwrap();

        engine
            .handle_event(press("pico_a", ButtonType::Lower))
            .await
            .unwrap();

        assert_eq!(
            next_command(&mut rx).await,
            ToIntegrationMessage::LightCommand {
                entity_id: "light.entryway".to_string(),
                command: LightCommand::on().with_brightness_pct(50),
            }
        );

        let state = engine.state_snapshot();
        let remote = state.remotes.get("lutron_pico_5_light.entryway").unwrap();
        assert_eq!(remote.last_action, ButtonType::Lower);
    }

    #[tokio::test]
    async fn test_stop_presses_advance_stored_scene() {
        let (engine, mut rx) = engine();
        discover_entryway(&engine).await;

        for expected in [0, 1, 2] {
            engine
                .handle_event(press("pico_a", ButtonType::Stop))
                .await
                .unwrap();
            next_command(&mut rx).await;

            let state = engine.state_snapshot();
            let remote = state.remotes.get("lutron_pico_5_light.entryway").unwrap();
            assert_eq!(remote.scene_index, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_unconfigured_remote_is_ignored() {
        let (engine, _rx) = engine();
        discover_entryway(&engine).await;

        engine
            .handle_event(press("pico_unknown", ButtonType::On))
            .await
            .unwrap();

        assert!(engine.state_snapshot().remotes.is_empty());
    }

    #[tokio::test]
    async fn test_press_recorded_when_light_not_discovered() {
        let (engine, _rx) = engine();

        engine
            .handle_event(press("pico_a", ButtonType::On))
            .await
            .unwrap();

        let state = engine.state_snapshot();
        assert_eq!(
            state
                .remotes
                .get("lutron_pico_5_light.entryway")
                .map(|r| r.last_action),
            Some(ButtonType::On)
        );
    }

    #[tokio::test]
    async fn test_removed_light_forgets_state_and_route() {
        let (engine, _rx) = engine();
        discover_entryway(&engine).await;
        engine
            .handle_event(FromIntegrationMessage::LightStateChanged {
                entity_id: "light.entryway".to_string(),
                on: true,
                brightness: Some(255),
            })
            .await
            .unwrap();

        engine
            .handle_event(FromIntegrationMessage::EntityRemoved {
                entity_id: "light.entryway".to_string(),
            })
            .await
            .unwrap();

        assert!(engine.state_snapshot().lights.is_empty());
        assert!(engine
            .send_light_command("light.entryway".to_string(), LightCommand::on())
            .is_err());
    }
}
