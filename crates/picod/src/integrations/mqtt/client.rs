use std::error::Error;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::LastWill;
use rumqttc::MqttOptions;
use rumqttc::Packet;
use rumqttc::QoS;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use super::MqttConfig;

pub const AVAILABILITY_ONLINE: &[u8] = b"online";
pub const AVAILABILITY_OFFLINE: &[u8] = b"offline";

/// MQTT message received from a subscription
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Check a topic against a subscription filter with `+` / `#` wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Re-announce availability and replay subscriptions.
///
/// Run after the broker accepted a reconnect: the session was clean, so the
/// broker has forgotten our subscriptions and holds the `offline` last will.
pub async fn restore_session<C: MqttClient + ?Sized>(
    client: &mut C,
    availability_topic: &str,
    subscriptions: &[String],
) -> Result<(), Box<dyn Error + Send>> {
    client
        .publish(availability_topic, AVAILABILITY_ONLINE, true)
        .await?;
    for topic in subscriptions {
        client.subscribe(topic).await?;
    }
    Ok(())
}

fn not_connected() -> Box<dyn Error + Send> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "MQTT client not connected. Call connect() first.",
    ))
}

/// MQTT operations picod needs, behind a trait so tests can use a mock broker.
#[async_trait]
pub trait MqttClient: Send + Sync {
    /// Connect to the broker and announce availability
    async fn connect(&mut self) -> Result<(), Box<dyn Error + Send>>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn Error + Send>>;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Box<dyn Error + Send>>;

    /// Next message from the subscribed topics, `None` when the client has stopped
    async fn poll_message(&mut self) -> Option<MqttMessage>;
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockMqttClient {
    pub messages: std::collections::VecDeque<MqttMessage>,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>, bool)>,
    pub is_connected: bool,
}

#[cfg(test)]
#[async_trait]
impl MqttClient for MockMqttClient {
    async fn connect(&mut self) -> Result<(), Box<dyn Error + Send>> {
        self.is_connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn Error + Send>> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Box<dyn Error + Send>> {
        if !self.is_connected {
            return Err(not_connected());
        }
        self.published
            .push((topic.to_string(), payload.to_vec(), retain));
        Ok(())
    }

    async fn poll_message(&mut self) -> Option<MqttMessage> {
        self.messages.pop_front()
    }
}

#[cfg(test)]
impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, topic: &str, payload: &[u8]) {
        self.messages.push_back(MqttMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }
}

/// What the event loop task forwards to the client
enum LoopEvent {
    Message(MqttMessage),
    /// The broker accepted a connection after the first one
    Reconnected,
}

/// MQTT client backed by rumqttc
pub struct RumqttcClient {
    /// Connection options; the client is created lazily in connect()
    mqtt_options: MqttOptions,

    availability_topic: String,

    client: Option<AsyncClient>,

    /// Topics to replay after a reconnect
    subscriptions: Vec<String>,

    restore_pending: bool,

    /// Publishes and reconnects forwarded from the event loop task
    event_rx: Option<mpsc::UnboundedReceiver<LoopEvent>>,

    event_loop_task: Option<JoinHandle<()>>,
}

impl RumqttcClient {
    pub fn new(config: &MqttConfig) -> anyhow::Result<Self> {
        let mut mqtt_options =
            MqttOptions::new(config.client_id.clone(), config.broker.clone(), config.port);

        mqtt_options.set_keep_alive(Duration::from_secs(30));

        // Discovery payloads for large devices exceed the default limit
        mqtt_options.set_max_packet_size(2 * 1024 * 1024, 2 * 1024 * 1024);

        let availability_topic = config.availability_topic();
        mqtt_options.set_last_will(LastWill::new(
            availability_topic.clone(),
            AVAILABILITY_OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));

        if let Some((username, password)) = config.credentials() {
            mqtt_options.set_credentials(username, password);
        }

        Ok(Self {
            mqtt_options,
            availability_topic,
            client: None,
            subscriptions: Vec::new(),
            restore_pending: false,
            event_rx: None,
            event_loop_task: None,
        })
    }
}

#[async_trait]
impl MqttClient for RumqttcClient {
    async fn connect(&mut self) -> Result<(), Box<dyn Error + Send>> {
        let (client, mut event_loop) = AsyncClient::new(self.mqtt_options.clone(), 10);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut connected_before = false;
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let msg = MqttMessage {
                            topic: publish.topic.to_string(),
                            payload: publish.payload.to_vec(),
                        };

                        if event_tx.send(LoopEvent::Message(msg)).is_err() {
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                        if connected_before && event_tx.send(LoopEvent::Reconnected).is_err() {
                            break;
                        }
                        connected_before = true;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT event loop error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
            info!("MQTT event loop task exiting");
        });

        self.client = Some(client);
        self.event_rx = Some(event_rx);
        self.event_loop_task = Some(task);

        let availability_topic = self.availability_topic.clone();
        self.publish(&availability_topic, AVAILABILITY_ONLINE, true)
            .await
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn Error + Send>> {
        let client = self.client.as_ref().ok_or_else(not_connected)?;

        client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| Box::new(e) as Box<dyn Error + Send>)?;

        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Box<dyn Error + Send>> {
        let client = self.client.as_ref().ok_or_else(not_connected)?;

        client
            .publish(topic, QoS::AtLeastOnce, retain, payload.to_vec())
            .await
            .map_err(|e| Box::new(e) as Box<dyn Error + Send>)
    }

    async fn poll_message(&mut self) -> Option<MqttMessage> {
        loop {
            // Cleared only once the restore ran, so a cancelled poll retries it
            if self.restore_pending {
                let availability_topic = self.availability_topic.clone();
                let subscriptions = self.subscriptions.clone();
                match restore_session(self, &availability_topic, &subscriptions).await {
                    Ok(()) => info!(
                        "Restored {} subscriptions after reconnect",
                        subscriptions.len()
                    ),
                    Err(e) => warn!("Failed to restore MQTT session: {}", e),
                }
                self.restore_pending = false;
            }

            match self.event_rx.as_mut()?.recv().await? {
                LoopEvent::Message(msg) => return Some(msg),
                LoopEvent::Reconnected => self.restore_pending = true,
            }
        }
    }
}

impl Drop for RumqttcClient {
    fn drop(&mut self) {
        if let Some(task) = self.event_loop_task.take() {
            task.abort();
        }
    }
}
