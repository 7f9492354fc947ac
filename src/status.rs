// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::RESULT_OK;
use crate::crypto::{open, Envelope};
use crate::devices::{Device, Panel};
use crate::error::{HubError, Result};

/// A gateway status report: the reported state of every panel at one
/// point in time.
///
/// Only `device_no` is required on the wire; it is the cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(rename = "time_stamp", default)]
    pub timestamp: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub serial: String,
    pub device_no: String,
    #[serde(default)]
    pub panels: Vec<Panel>,
}

impl StatusSnapshot {
    /// Find the device on panel `address` whose `channel` attribute matches.
    ///
    /// Panels and their devices are scanned in report order; the first hit
    /// wins. Reports are small, so there is no index.
    pub fn device(&self, address: &str, channel: &str) -> Option<&Device> {
        self.panels
            .iter()
            .filter(|panel| panel.address == address)
            .find_map(|panel| panel.device(channel))
    }
}

/// Gateway acknowledgement of a command, correlated by `serial`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub device_no: String,
    /// `"1"` on success, `"0"` on failure
    pub result: String,
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        self.result == RESULT_OK
    }
}

/// A decoded message from the shared status topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Status(StatusSnapshot),
    CommandResult(CommandResult),
}

// Just enough of a payload to tell acknowledgements apart from reports.
#[derive(Deserialize)]
struct PayloadShape {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    panels: Option<serde_json::Value>,
}

/// Turns raw payloads from the status topic into structured messages.
#[derive(Clone, Default)]
pub struct StatusDecoder {
    envelope: Option<Envelope>,
}

impl StatusDecoder {
    /// Create a decoder; payloads are decrypted first when `envelope` is set.
    pub fn new(envelope: Option<Envelope>) -> Self {
        Self { envelope }
    }

    /// Decrypt (if enabled) and parse a status report.
    pub fn parse(&self, payload: &[u8]) -> Result<StatusSnapshot> {
        let plain = open(self.envelope.as_ref(), payload)?;
        serde_json::from_slice(&plain).map_err(HubError::Parse)
    }

    /// Decrypt (if enabled) and classify an inbound payload.
    ///
    /// Payloads carrying a `result` field and no `panels` are command
    /// acknowledgements; everything else is parsed as a status report.
    pub fn decode(&self, payload: &[u8]) -> Result<Inbound> {
        let plain = open(self.envelope.as_ref(), payload)?;
        let shape: PayloadShape = serde_json::from_slice(&plain).map_err(HubError::Parse)?;
        if shape.result.is_some() && shape.panels.is_none() {
            let result: CommandResult = serde_json::from_slice(&plain).map_err(HubError::Parse)?;
            debug!("Decoded command result for serial {}", result.serial);
            return Ok(Inbound::CommandResult(result));
        }
        let snapshot: StatusSnapshot = serde_json::from_slice(&plain).map_err(HubError::Parse)?;
        Ok(Inbound::Status(snapshot))
    }
}
