use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::MqttConfig;
use super::client::MqttClient;
use super::client::MqttMessage;
use super::client::topic_matches;
use super::discovery::DiscoveryMessage;
use super::discovery::parse_discovery_topic;
use super::light::Light;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::LightCommand;
use crate::engine::ToIntegrationMessage;
use crate::pico::ButtonEvent;

/// Type alias for the shared lights map
type LightsMap = Arc<Mutex<HashMap<String, Light>>>;

fn invalid_data(e: impl ToString) -> Box<dyn Error + Send> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        e.to_string(),
    ))
}

/// MQTT integration for picod
///
/// Discovers Zigbee2MQTT lights, tracks their state, forwards Caseta button
/// events to the engine, and publishes light commands.
pub struct MqttIntegration<C: MqttClient> {
    client: Arc<Mutex<C>>,
    config: MqttConfig,
    lights: LightsMap,
    /// Handle to the background message processing task
    message_task: Option<JoinHandle<()>>,
}

impl<C: MqttClient> MqttIntegration<C> {
    pub fn new(client: C, config: &MqttConfig) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            config: config.clone(),
            lights: Arc::new(Mutex::new(HashMap::new())),
            message_task: None,
        }
    }

    /// Process incoming MQTT messages until the client stops.
    ///
    /// Runs as its own task so handle_message() can publish commands
    /// concurrently; the client lock is only held for short polls.
    async fn process_messages_task(
        client: Arc<Mutex<C>>,
        config: MqttConfig,
        lights: LightsMap,
        to_engine: FromIntegrationSender,
    ) {
        loop {
            let msg = {
                let mut client_guard = client.lock().await;
                tokio::time::timeout(
                    std::time::Duration::from_millis(100),
                    client_guard.poll_message(),
                )
                .await
            };

            match msg {
                Ok(Some(msg)) => {
                    if let Err(e) =
                        Self::handle_mqtt_message(&msg, &config, &client, &lights, &to_engine).await
                    {
                        warn!("Error handling message on {}: {}", msg.topic, e);
                    }
                }
                Ok(None) => {
                    info!("MQTT client stopped, message processing exiting");
                    break;
                }
                Err(_) => {
                    // Poll timed out; let command handling take the lock
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    async fn handle_mqtt_message(
        msg: &MqttMessage,
        config: &MqttConfig,
        client: &Arc<Mutex<C>>,
        lights: &LightsMap,
        to_engine: &FromIntegrationSender,
    ) -> Result<(), Box<dyn Error + Send>> {
        debug!("Received message on topic: {}", msg.topic);

        if topic_matches(&config.button_event_topic, &msg.topic) {
            Self::handle_button_event(msg, to_engine).await
        } else if msg.topic.starts_with(&config.discovery_prefix) && msg.topic.ends_with("/config")
        {
            Self::handle_discovery(msg, config, client, lights, to_engine).await
        } else {
            Self::handle_state_update(msg, lights, to_engine).await
        }
    }

    /// Forward a Caseta button event to the engine.
    ///
    /// Filtering by device and action happens in the engine's trigger registry.
    async fn handle_button_event(
        msg: &MqttMessage,
        to_engine: &FromIntegrationSender,
    ) -> Result<(), Box<dyn Error + Send>> {
        let event = ButtonEvent::from_payload(&msg.payload).map_err(invalid_data)?;
        debug!(
            "Button event: {} {} {}",
            event.device_id, event.button_type, event.action
        );

        to_engine
            .send(FromIntegrationMessage::ButtonPressed(event))
            .await
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })
    }

    async fn handle_discovery(
        msg: &MqttMessage,
        config: &MqttConfig,
        client: &Arc<Mutex<C>>,
        lights: &LightsMap,
        to_engine: &FromIntegrationSender,
    ) -> Result<(), Box<dyn Error + Send>> {
        let topic = parse_discovery_topic(&msg.topic, &config.discovery_prefix)
            .ok_or_else(|| invalid_data("Failed to parse discovery topic"))?;

        debug!(
            "Discovery: component={}, node_id={}, object_id={}",
            topic.component, topic.node_id, topic.object_id
        );

        if topic.component != "light" {
            debug!("Ignoring unsupported component: {}", topic.component);
            return Ok(());
        }

        let entity_id = format!("light.{}", topic.node_id);

        // An empty retained config removes the entity
        if msg.payload.is_empty() {
            let removed = lights.lock().await.remove(&entity_id).is_some();
            if removed {
                info!("Removed light entity: {}", entity_id);
                Self::send_to_engine(
                    FromIntegrationMessage::EntityRemoved { entity_id },
                    to_engine,
                )
                .await;
            }
            return Ok(());
        }

        let discovery: DiscoveryMessage =
            serde_json::from_slice(&msg.payload).map_err(invalid_data)?;

        let light = Light::from_discovery(discovery, entity_id.clone(), topic.node_id)
            .map_err(invalid_data)?;

        let state_topic = light.state_topic.clone();
        info!("Discovered light entity: {} ({})", light.name, entity_id);

        lights.lock().await.insert(entity_id.clone(), light);

        // Subscribe after map insert so the retained state message finds the
        // entity already in the map.
        client.lock().await.subscribe(&state_topic).await?;

        Self::send_to_engine(
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                integration_name: "mqtt".to_string(),
            },
            to_engine,
        )
        .await;

        Ok(())
    }

    async fn handle_state_update(
        msg: &MqttMessage,
        lights: &LightsMap,
        to_engine: &FromIntegrationSender,
    ) -> Result<(), Box<dyn Error + Send>> {
        let update = {
            let mut lights_guard = lights.lock().await;
            let Some((entity_id, light)) = lights_guard
                .iter_mut()
                .find(|(_, light)| light.state_topic == msg.topic)
            else {
                debug!("No entity for topic {}", msg.topic);
                return Ok(());
            };

            light.update_state(&msg.payload).map_err(invalid_data)?;
            FromIntegrationMessage::LightStateChanged {
                entity_id: entity_id.clone(),
                on: light.state.on,
                brightness: light.state.brightness,
            }
        };

        Self::send_to_engine(update, to_engine).await;
        Ok(())
    }

    async fn send_to_engine(msg: FromIntegrationMessage, to_engine: &FromIntegrationSender) {
        if let Err(e) = to_engine.send(msg).await {
            warn!("Failed to send message to engine: {}", e);
        }
    }

    /// Publish a command to a light
    pub async fn send_light_command(
        &self,
        light_id: &str,
        command: &LightCommand,
    ) -> Result<(), Box<dyn Error + Send>> {
        let (command_topic, payload) = {
            let lights_guard = self.lights.lock().await;
            let light = lights_guard.get(light_id).ok_or_else(|| -> Box<dyn Error + Send> {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Light not found: {}", light_id),
                ))
            })?;

            let payload = light.command_payload(command).map_err(invalid_data)?;
            (light.command_topic.clone(), payload)
        };

        self.client
            .lock()
            .await
            .publish(&command_topic, &payload, false)
            .await?;

        info!("Sent command to light {}: {:?}", light_id, command);

        Ok(())
    }
}

#[async_trait]
impl<C: MqttClient + 'static> Integration for MqttIntegration<C> {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        info!(
            "Connecting to MQTT broker at {}:{}",
            self.config.broker, self.config.port
        );
        {
            let mut client = self.client.lock().await;
            client.connect().await?;

            let light_discovery = format!("{}/light/+/+/config", self.config.discovery_prefix);
            info!(
                "Subscribing to {} and {}",
                light_discovery, self.config.button_event_topic
            );
            client.subscribe(&light_discovery).await?;
            client.subscribe(&self.config.button_event_topic).await?;
        }
        info!("Connected to MQTT broker");

        let client = self.client.clone();
        let config = self.config.clone();
        let lights = self.lights.clone();

        let task = tokio::spawn(async move {
            Self::process_messages_task(client, config, lights, tx).await;
        });
        self.message_task = Some(task);

        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::LightCommand { entity_id, command } => {
                self.send_light_command(&entity_id, &command).await
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("MQTT integration shutting down");
        if let Some(task) = self.message_task.take() {
            task.abort();
        }
        Ok(())
    }
}
