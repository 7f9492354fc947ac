// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

use serde::{Deserialize, Serialize};

use crate::config::HubConfig;
use crate::constants::{READ_STATUS, SET_PANELS};
use crate::crypto::{seal, Envelope};
use crate::devices::{Device, Panel};
use crate::error::{HubError, Result};

/// Commands that can be published to a gateway.
///
/// # Wire format
///
/// Every command is a flat JSON object. Field names are fixed by the gateway
/// firmware:
///
/// ```text
/// set_panels:  {"command","serial","device_no","panels":[{"address","child_dev":[{..}]}],"time_stamp"}
/// read_status: {"time_stamp","command","serial"}
/// ```
///
/// `serial` and `time_stamp` both carry the creation time in epoch
/// milliseconds. The gateway echoes `serial` in its reply, so two commands
/// created in the same millisecond cannot be told apart.
///
/// # Encryption
///
/// When the hub is configured with a secret, [`Command::msg`] wraps the JSON
/// in the [`Envelope`] before it is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `set_panels` - write device attributes on one or more panels.
    SetPanels(SetPanelsCommand),
    /// `read_status` - ask the gateway to report all panels.
    ReadStatus(ReadStatusCommand),
}

/// Payload of a `set_panels` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPanelsCommand {
    pub command: String,
    pub serial: String,
    pub device_no: String,
    pub panels: Vec<Panel>,
    #[serde(rename = "time_stamp")]
    pub timestamp: String,
}

/// Payload of a `read_status` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStatusCommand {
    #[serde(rename = "time_stamp")]
    pub timestamp: String,
    pub command: String,
    pub serial: String,
}

/// Current time in epoch milliseconds, rendered the way serials are sent.
pub fn new_serial() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

impl Command {
    /// Build a `set_panels` command that writes `device` on the local panel.
    pub fn set_panels(config: &HubConfig, device: Device) -> Self {
        let panel = Panel::new(config.panel_address.clone(), vec![device]);
        Self::set_panels_with(config, vec![panel])
    }

    /// Build a `set_panels` command carrying an arbitrary panel list.
    pub fn set_panels_with(config: &HubConfig, panels: Vec<Panel>) -> Self {
        let serial = new_serial();
        Command::SetPanels(SetPanelsCommand {
            command: SET_PANELS.to_string(),
            serial: serial.clone(),
            device_no: config.device_no.clone(),
            panels,
            timestamp: serial,
        })
    }

    /// Build a `read_status` request.
    pub fn read_status() -> Self {
        let serial = new_serial();
        Command::ReadStatus(ReadStatusCommand {
            timestamp: serial.clone(),
            command: READ_STATUS.to_string(),
            serial,
        })
    }

    /// Command identifier, for logging and correlation.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetPanels(_) => SET_PANELS,
            Command::ReadStatus(_) => READ_STATUS,
        }
    }

    /// Correlation token echoed by the gateway.
    pub fn serial(&self) -> &str {
        match self {
            Command::SetPanels(cmd) => &cmd.serial,
            Command::ReadStatus(cmd) => &cmd.serial,
        }
    }

    /// Serialize to the plain JSON wire encoding.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let encoded = match self {
            Command::SetPanels(cmd) => serde_json::to_vec(cmd),
            Command::ReadStatus(cmd) => serde_json::to_vec(cmd),
        };
        encoded.map_err(HubError::Encoding)
    }

    /// Serialize and, when `envelope` is set, encrypt the payload.
    pub fn msg(&self, envelope: Option<&Envelope>) -> Result<Vec<u8>> {
        seal(envelope, self.to_json()?)
    }
}
