// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

pub mod mqtt;

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::Result;

/// A message delivered by the bus on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish/subscribe capability the bridge needs from a message bus.
///
/// Delivery guarantees, session persistence and reconnection belong to the
/// implementation. Inbound messages for every subscribed topic arrive on the
/// receiver handed out by [`MessageBus::connect`].
pub trait MessageBus: Send + Sync {
    /// Establish the connection. Fails if the broker cannot be reached.
    fn connect(&mut self) -> impl Future<Output = Result<mpsc::Receiver<InboundMessage>>> + Send;

    /// Send `payload` to `topic` with at-least-once delivery, not retained.
    fn publish(&self, topic: &str, payload: Vec<u8>) -> impl Future<Output = Result<()>> + Send;

    /// Start receiving messages published on `topic`.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<()>> + Send;

    /// Close the connection.
    fn disconnect(&mut self) -> impl Future<Output = Result<()>> + Send;
}
