// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

use std::fmt;

use crate::constants::{receive_topic, DEFAULT_BROKER};
use crate::crypto::Envelope;
use crate::error::{HubError, Result};

/// Immutable configuration for talking to one gateway hub.
///
/// Built once at startup and handed to every component that needs it.
#[derive(Clone)]
pub struct HubConfig {
    /// Gateway device number, e.g. `c49878f1e235`
    pub device_no: String,
    /// Address of the local control panel on the gateway, e.g. `A1`
    pub panel_address: String,
    /// Broker endpoint (`host:port`, `mqtt://host:port` or `tcp://host:port`)
    pub broker: String,
    /// MQTT client id; must be unique per broker for the persistent session
    pub client_id: String,
    /// Broker username (empty = anonymous)
    pub username: String,
    /// Broker password (empty = none)
    pub password: String,
    /// Whether payloads are wrapped in the Triple-DES envelope
    pub secret_enable: bool,
    /// 24-byte envelope key
    pub secret_key: String,
    /// MQTT keep-alive in seconds
    pub keep_alive_secs: u64,
    /// Capacity of the inbound message channel
    pub inbound_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            device_no: String::new(),
            panel_address: String::new(),
            broker: DEFAULT_BROKER.to_string(),
            client_id: default_client_id(),
            username: String::new(),
            password: String::new(),
            secret_enable: false,
            secret_key: String::new(),
            keep_alive_secs: 30,
            inbound_capacity: 256,
        }
    }
}

// Keeps the password and key out of logs.
impl fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConfig")
            .field("device_no", &self.device_no)
            .field("panel_address", &self.panel_address)
            .field("broker", &self.broker)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &mask(&self.password))
            .field("secret_enable", &self.secret_enable)
            .field("secret_key", &mask(&self.secret_key))
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("inbound_capacity", &self.inbound_capacity)
            .finish()
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "********" }
}

/// Client id used when none is configured: `controller-<epoch ms>`.
pub fn default_client_id() -> String {
    format!("controller-{}", chrono::Utc::now().timestamp_millis())
}

impl HubConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }

    /// Topic that commands for this gateway are published to.
    pub fn receive_topic(&self) -> String {
        receive_topic(&self.device_no)
    }

    /// Build the payload envelope when encryption is enabled.
    ///
    /// Returns `Ok(None)` when encryption is off; the key is only validated
    /// when it is going to be used.
    pub fn envelope(&self) -> Result<Option<Envelope>> {
        if !self.secret_enable {
            return Ok(None);
        }
        Envelope::new(self.secret_key.as_bytes()).map(Some)
    }

    /// Check the fields every component relies on.
    pub fn validate(&self) -> Result<()> {
        if self.device_no.is_empty() {
            return Err(HubError::InvalidConfig {
                details: "device_no must not be empty".to_string(),
            });
        }
        if self.client_id.is_empty() {
            return Err(HubError::InvalidConfig {
                details: "client_id must not be empty".to_string(),
            });
        }
        if self.inbound_capacity == 0 {
            return Err(HubError::InvalidConfig {
                details: "inbound_capacity must be at least 1".to_string(),
            });
        }
        parse_broker_url(&self.broker)?;
        self.envelope()?;
        Ok(())
    }
}

/// Builder for HubConfig.
#[derive(Debug, Clone, Default)]
pub struct HubConfigBuilder {
    config: HubConfig,
}

impl HubConfigBuilder {
    pub fn device_no(mut self, device_no: impl Into<String>) -> Self {
        self.config.device_no = device_no.into();
        self
    }

    pub fn panel_address(mut self, address: impl Into<String>) -> Self {
        self.config.panel_address = address.into();
        self
    }

    pub fn broker(mut self, broker: impl Into<String>) -> Self {
        self.config.broker = broker.into();
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn secret_enable(mut self, enable: bool) -> Self {
        self.config.secret_enable = enable;
        self
    }

    pub fn secret_key(mut self, key: impl Into<String>) -> Self {
        self.config.secret_key = key.into();
        self
    }

    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.config.keep_alive_secs = secs;
        self
    }

    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.config.inbound_capacity = capacity;
        self
    }

    pub fn build(self) -> HubConfig {
        self.config
    }
}

/// Parse a broker endpoint like "mqtt://host:port" into (host, port).
///
/// A bare `host:port` is accepted as well.
pub fn parse_broker_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped.rsplit_once(':').ok_or_else(|| HubError::InvalidConfig {
        details: format!("broker must be in format host:port, got {url:?}"),
    })?;

    if host.is_empty() {
        return Err(HubError::InvalidConfig {
            details: format!("broker host is empty in {url:?}"),
        });
    }

    let port: u16 = port_str.parse().map_err(|_| HubError::InvalidConfig {
        details: format!("invalid broker port {port_str:?}"),
    })?;

    Ok((host.to_string(), port))
}
