// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge
//
//! # gateway-hub
//!
//! Talks to a smart-home gateway hub over MQTT.
//!
//! Commands (`set_panels`, `read_status`) are published to the gateway's
//! command topic `/receive/<device_no>`. Status reports from every gateway
//! arrive on `/send/devices`, are parsed and kept in a [`StatusCache`] keyed by
//! device number. Payloads can optionally be wrapped in a Triple-DES
//! [`Envelope`] shared with the gateway firmware.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gateway_hub::{Bridge, Device, HubConfig, MqttBus};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HubConfig::builder()
//!         .device_no("c49878f1e235")
//!         .panel_address("A1")
//!         .broker("mqtt://localhost:1883")
//!         .build();
//!
//!     let bus = MqttBus::new(&config)?;
//!     let mut bridge = Bridge::new(config, bus)?;
//!
//!     let mut events = bridge.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     bridge.connect().await?;
//!     bridge.set_device(Device::new().with("channel", "1").with("state", "on")).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     bridge.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod cache;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod devices;
pub mod error;
pub mod event;
pub mod protocol;
pub mod status;
pub mod transport;

// Re-exports for convenience
pub use bridge::{Bridge, BridgeState};
pub use cache::StatusCache;
pub use config::{HubConfig, HubConfigBuilder};
pub use crypto::Envelope;
pub use devices::{Device, Panel};
pub use error::{HubError, Result};
pub use event::{EventReceiver, HubEvent};
pub use protocol::Command;
pub use status::{CommandResult, Inbound, StatusDecoder, StatusSnapshot};
pub use transport::mqtt::MqttBus;
pub use transport::{InboundMessage, MessageBus};
