// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

use std::sync::Arc;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::{parse_broker_url, HubConfig};
use crate::error::{HubError, Result};
use crate::transport::{InboundMessage, MessageBus};

/// Capacity of the rumqttc request queue between client and event loop.
const REQUEST_CAPACITY: usize = 256;

/// MQTT implementation of [`MessageBus`] on top of rumqttc.
///
/// The session is persistent (`clean_session = false`), so QoS 1 messages
/// queued by the broker while we were away are delivered after a reconnect.
/// Every [`MessageBus::connect`] starts a fresh client and event loop from the
/// same options, so the bus can be reconnected after a failure or a
/// disconnect.
pub struct MqttBus {
    options: MqttOptions,
    client: Option<AsyncClient>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    inbound_capacity: usize,
    loop_handle: Option<JoinHandle<()>>,
}

impl MqttBus {
    /// Prepare a client for the configured broker. Nothing is sent until
    /// [`MessageBus::connect`] is called.
    pub fn new(config: &HubConfig) -> Result<Self> {
        let (host, port) = parse_broker_url(&config.broker)?;
        if config.client_id.is_empty() || config.client_id.starts_with(' ') {
            return Err(HubError::InvalidConfig {
                details: format!("invalid MQTT client id {:?}", config.client_id),
            });
        }
        if config.inbound_capacity == 0 {
            return Err(HubError::InvalidConfig {
                details: "inbound_capacity must be at least 1".to_string(),
            });
        }

        let mut options = MqttOptions::new(&config.client_id, &host, port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(false);
        if !config.username.is_empty() {
            options.set_credentials(&config.username, &config.password);
        }

        info!(
            "MQTT broker {host}:{port} (client_id={}, user={}, password={})",
            config.client_id,
            if config.username.is_empty() { "-" } else { config.username.as_str() },
            if config.password.is_empty() { "-" } else { "********" },
        );

        Ok(Self {
            options,
            client: None,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            inbound_capacity: config.inbound_capacity,
            loop_handle: None,
        })
    }

    fn is_running(&self) -> bool {
        self.loop_handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Hand `inbound` to the status handler without blocking the event loop.
/// Returns `false` once the receiver is gone.
fn forward(tx: &mpsc::Sender<InboundMessage>, inbound: InboundMessage) -> bool {
    match tx.try_send(inbound) {
        Ok(()) => true,
        Err(TrySendError::Full(dropped)) => {
            warn!("Inbound queue full, dropping message on {}", dropped.topic);
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Re-issue every remembered subscription on `client`.
async fn resubscribe(client: &AsyncClient, subscriptions: &Mutex<Vec<String>>) {
    let topics = subscriptions.lock().await.clone();
    for topic in topics {
        info!("MQTT: subscribing to {topic}");
        if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce).await {
            error!("Failed to subscribe to {topic}: {e}");
        }
    }
}

impl MessageBus for MqttBus {
    async fn connect(&mut self) -> Result<mpsc::Receiver<InboundMessage>> {
        if self.is_running() {
            return Err(HubError::AlreadyConnected);
        }

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);

        // Drive the event loop until the broker accepts us; the first
        // failure is reported instead of retried.
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("MQTT: connected (session_present={})", ack.session_present);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connect failed: {e}");
                    return Err(e.into());
                }
            }
        }

        self.client = Some(client.clone());
        resubscribe(&client, &self.subscriptions).await;

        // Sized by inbound_capacity; when the handler lags, messages are
        // dropped rather than stalling pings and acks.
        let (tx, rx) = mpsc::channel(self.inbound_capacity);
        let subscriptions = Arc::clone(&self.subscriptions);

        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // rumqttc does not resubscribe on its own after a
                        // broker reconnect.
                        info!("MQTT: reconnected");
                        resubscribe(&client, &subscriptions).await;
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        let inbound = InboundMessage {
                            topic: msg.topic.clone(),
                            payload: msg.payload.to_vec(),
                        };
                        if !forward(&tx, inbound) {
                            debug!("Inbound receiver dropped, stopping MQTT event loop");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT event loop error: {e}");
                        sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        self.loop_handle = Some(handle);
        Ok(rx)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let client = self.client.as_ref().ok_or(HubError::NotConnected)?;
        client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        {
            let mut subscriptions = self.subscriptions.lock().await;
            if !subscriptions.iter().any(|t| t == topic) {
                subscriptions.push(topic.to_string());
            }
        }
        // Remembered topics are subscribed as part of connect.
        if let Some(client) = &self.client {
            client.subscribe(topic, QoS::AtLeastOnce).await?;
            info!("MQTT: subscribed to {topic}");
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take()
            && let Err(e) = client.disconnect().await
        {
            warn!("MQTT disconnect request failed: {e}");
        }
        if let Some(handle) = self.loop_handle.take() {
            handle.abort();
        }
        Ok(())
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        if let Some(handle) = self.loop_handle.take() {
            handle.abort();
        }
    }
}
