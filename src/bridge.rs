// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::StatusCache;
use crate::config::HubConfig;
use crate::constants::SEND_DEVICES_TOPIC;
use crate::crypto::Envelope;
use crate::devices::Device;
use crate::error::{HubError, Result};
use crate::event::{event_channel, EventReceiver, EventSender, HubEvent};
use crate::protocol::Command;
use crate::status::{Inbound, StatusDecoder, StatusSnapshot};
use crate::transport::{InboundMessage, MessageBus};

/// Connection state of a [`Bridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connected,
}

/// Links one gateway hub to a message bus.
///
/// Commands go out on `/receive/<device_no>`; status reports from every
/// gateway arrive on `/send/devices` and land in the shared [`StatusCache`].
///
/// # Example
///
/// ```no_run
/// use gateway_hub::{Bridge, Device, HubConfig, MqttBus};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = HubConfig::builder()
///         .device_no("c49878f1e235")
///         .panel_address("A1")
///         .broker("localhost:1883")
///         .build();
///
///     let bus = MqttBus::new(&config)?;
///     let mut bridge = Bridge::new(config, bus)?;
///     bridge.connect().await?;
///
///     bridge.set_device(Device::new().with("channel", "1").with("state", "on")).await?;
///     bridge.request_status().await?;
///
///     if let Some(device) = bridge.device_status("1") {
///         println!("channel 1: {:?}", device.get("state"));
///     }
///
///     bridge.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Bridge<B: MessageBus> {
    bus: B,
    config: HubConfig,
    envelope: Option<Envelope>,
    decoder: StatusDecoder,
    cache: Arc<StatusCache>,
    event_tx: EventSender,
    state: BridgeState,
    handler_handle: Option<JoinHandle<()>>,
}

impl<B: MessageBus> Bridge<B> {
    /// Bind a bridge to `bus`. Nothing is sent until [`Bridge::connect`].
    pub fn new(config: HubConfig, bus: B) -> Result<Self> {
        config.validate()?;
        let envelope = config.envelope()?;
        let (event_tx, _event_rx) = event_channel(256);

        info!(
            "Gateway {} (panel {}, encryption {})",
            config.device_no,
            config.panel_address,
            if envelope.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            bus,
            decoder: StatusDecoder::new(envelope.clone()),
            cache: Arc::new(StatusCache::new(&config.device_no, &config.panel_address)),
            envelope,
            config,
            event_tx,
            state: BridgeState::Disconnected,
            handler_handle: None,
        })
    }

    /// Connect the bus and start handling status reports.
    ///
    /// A connect failure is returned as-is; retrying is up to the caller. If
    /// the status subscription fails the bus is closed again.
    /// Calling this while already connected does nothing.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == BridgeState::Connected {
            debug!("Bridge already connected");
            return Ok(());
        }

        let inbound = self.bus.connect().await?;
        let subscribed = self.bus.subscribe(SEND_DEVICES_TOPIC).await;
        if let Err(e) = subscribed {
            error!("Failed to subscribe to {SEND_DEVICES_TOPIC}: {e}");
            if let Err(close_err) = self.bus.disconnect().await {
                warn!("Error closing bus after failed subscribe: {close_err}");
            }
            return Err(e);
        }

        let handler = StatusHandler {
            decoder: self.decoder.clone(),
            cache: Arc::clone(&self.cache),
            event_tx: self.event_tx.clone(),
        };
        self.handler_handle = Some(tokio::spawn(handler.run(inbound)));
        self.state = BridgeState::Connected;

        info!("Bridge connected, listening on {SEND_DEVICES_TOPIC}");
        let _ = self.event_tx.send(HubEvent::Connected);
        Ok(())
    }

    /// Serialize `command` and send it to this gateway's command topic.
    pub async fn publish(&self, command: &Command) -> Result<()> {
        if self.state != BridgeState::Connected {
            return Err(HubError::NotConnected);
        }

        let payload = command.msg(self.envelope.as_ref())?;
        let topic = self.config.receive_topic();
        debug!("Publishing to {topic}: {}", String::from_utf8_lossy(&payload));

        if let Err(e) = self.bus.publish(&topic, payload).await {
            error!("Failed to publish {} to {topic}: {e}", command.name());
            return Err(e);
        }

        info!("Sent {} (serial {})", command.name(), command.serial());
        let _ = self.event_tx.send(HubEvent::CommandPublished {
            command: command.name(),
            serial: command.serial().to_string(),
        });
        Ok(())
    }

    /// Ask the gateway for a full status report. Returns the request serial.
    pub async fn request_status(&self) -> Result<String> {
        let command = Command::read_status();
        self.publish(&command).await?;
        Ok(command.serial().to_string())
    }

    /// Push `device` to the local panel. Returns the command serial.
    pub async fn set_device(&self, device: Device) -> Result<String> {
        let command = Command::set_panels(&self.config, device);
        self.publish(&command).await?;
        Ok(command.serial().to_string())
    }

    /// Last reported state of the local-panel device on `channel`.
    pub fn device_status(&self, channel: &str) -> Option<Device> {
        self.cache.device_status(channel)
    }

    /// Latest report from this gateway.
    pub fn snapshot(&self) -> Option<Arc<StatusSnapshot>> {
        self.cache.load(&self.config.device_no)
    }

    pub fn cache(&self) -> Arc<StatusCache> {
        Arc::clone(&self.cache)
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Subscribe to bridge events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    /// Stop the status handler and close the bus.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state == BridgeState::Disconnected {
            return Ok(());
        }
        info!("Disconnecting bridge");

        if let Some(h) = self.handler_handle.take() {
            h.abort();
        }
        self.state = BridgeState::Disconnected;
        let _ = self.event_tx.send(HubEvent::Disconnected);

        self.bus.disconnect().await
    }
}

impl<B: MessageBus> Drop for Bridge<B> {
    fn drop(&mut self) {
        if let Some(h) = self.handler_handle.take() {
            h.abort();
        }
    }
}

/// Consumes inbound bus messages and feeds the cache.
struct StatusHandler {
    decoder: StatusDecoder,
    cache: Arc<StatusCache>,
    event_tx: EventSender,
}

impl StatusHandler {
    async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        while let Some(message) = inbound.recv().await {
            self.handle(&message);
        }
        debug!("Inbound channel closed, status handler stopping");
    }

    /// Never fails: bad payloads are logged and dropped.
    fn handle(&self, message: &InboundMessage) {
        if message.topic != SEND_DEVICES_TOPIC {
            debug!("Ignoring message on {}", message.topic);
            return;
        }

        match self.decoder.decode(&message.payload) {
            Ok(Inbound::Status(snapshot)) => {
                let device_no = snapshot.device_no.clone();
                let serial = snapshot.serial.clone();
                debug!("Status report from {device_no}: {} panel(s)", snapshot.panels.len());
                self.cache.store(device_no.clone(), snapshot);
                let _ = self.event_tx.send(HubEvent::StatusStored { device_no, serial });
            }
            Ok(Inbound::CommandResult(result)) => {
                if result.is_success() {
                    info!("Gateway {} accepted {} (serial {})", result.device_no, result.command, result.serial);
                } else {
                    warn!("Gateway {} rejected {} (serial {})", result.device_no, result.command, result.serial);
                }
                let _ = self.event_tx.send(HubEvent::CommandResult(result));
            }
            Err(e) => {
                warn!("Dropping payload on {}: {e}", message.topic);
                let _ = self.event_tx.send(HubEvent::PayloadRejected { reason: e.to_string() });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{"command":"read_status","device_no":"g1","panels":[{"address":"A1","child_dev":[{"channel":"2","power":"1"}]}]}"#;

    fn handler(envelope: Option<Envelope>) -> (StatusHandler, Arc<StatusCache>, EventReceiver) {
        let cache = Arc::new(StatusCache::new("g1", "A1"));
        let (event_tx, event_rx) = event_channel(16);
        let handler = StatusHandler {
            decoder: StatusDecoder::new(envelope),
            cache: Arc::clone(&cache),
            event_tx,
        };
        (handler, cache, event_rx)
    }

    fn message(topic: &str, payload: &[u8]) -> InboundMessage {
        InboundMessage { topic: topic.to_string(), payload: payload.to_vec() }
    }

    #[test]
    fn test_handle_stores_report() {
        let (handler, cache, mut events) = handler(None);
        handler.handle(&message(SEND_DEVICES_TOPIC, REPORT.as_bytes()));

        let dev = cache.device_status("2").unwrap();
        assert_eq!(dev, Device::new().with("channel", "2").with("power", "1"));
        assert_eq!(
            events.try_recv().unwrap(),
            HubEvent::StatusStored { device_no: "g1".into(), serial: String::new() }
        );
    }

    #[test]
    fn test_handle_drops_garbage_and_keeps_going() {
        let (handler, cache, mut events) = handler(None);
        handler.handle(&message(SEND_DEVICES_TOPIC, b"\x00\xffnot json"));
        assert!(cache.is_empty());
        assert!(matches!(events.try_recv().unwrap(), HubEvent::PayloadRejected { .. }));

        handler.handle(&message(SEND_DEVICES_TOPIC, REPORT.as_bytes()));
        assert!(cache.device_status("2").is_some());
    }

    #[test]
    fn test_handle_ignores_other_topics() {
        let (handler, cache, mut events) = handler(None);
        handler.handle(&message("/receive/g1", REPORT.as_bytes()));
        assert!(cache.is_empty());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_handle_stores_report_carrying_result() {
        let (handler, cache, mut events) = handler(None);
        let payload = br#"{"command":"read_status","device_no":"g1","result":"1","panels":[{"address":"A1","child_dev":[{"channel":"2","power":"1"}]}]}"#;
        handler.handle(&message(SEND_DEVICES_TOPIC, payload));

        assert_eq!(cache.device_status("2").and_then(|d| d.get("power").map(String::from)), Some("1".into()));
        assert!(matches!(events.try_recv().unwrap(), HubEvent::StatusStored { .. }));
    }

    #[test]
    fn test_handle_command_result_is_not_cached() {
        let (handler, cache, mut events) = handler(None);
        let payload = br#"{"command":"set_panels","serial":"7","device_no":"g1","result":"0"}"#;
        handler.handle(&message(SEND_DEVICES_TOPIC, payload));

        assert!(cache.is_empty());
        let HubEvent::CommandResult(result) = events.try_recv().unwrap() else {
            panic!("expected command result event");
        };
        assert_eq!(result.serial, "7");
        assert!(!result.is_success());
    }

    #[test]
    fn test_handle_encrypted_report() {
        let envelope = Envelope::new(b"0123456789abcdefghijklmn").unwrap();
        let sealed = envelope.encrypt(REPORT.as_bytes()).unwrap();
        let (handler, cache, _events) = handler(Some(envelope));

        handler.handle(&message(SEND_DEVICES_TOPIC, &sealed));
        assert_eq!(cache.load("g1").unwrap().panels.len(), 1);

        // plaintext is rejected once encryption is on
        handler.handle(&message(SEND_DEVICES_TOPIC, br#"{"device_no":"g2"}"#));
        assert!(cache.load("g2").is_none());
    }
}
