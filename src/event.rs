// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

use crate::status::CommandResult;

/// Events emitted by the bridge.
///
/// Observers subscribe via `bridge.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<HubEvent>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// Bus connection established and status handler running
    Connected,
    /// Bridge disconnected from the bus
    Disconnected,
    /// A command was handed to the bus
    CommandPublished { command: &'static str, serial: String },
    /// A status report replaced the cached snapshot for `device_no`
    StatusStored { device_no: String, serial: String },
    /// The gateway acknowledged a command
    CommandResult(CommandResult),
    /// An inbound payload could not be decrypted or parsed and was dropped
    PayloadRejected { reason: String },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<HubEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<HubEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
