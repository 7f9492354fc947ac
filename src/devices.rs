// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::CHANNEL_ATTR;

/// One controllable endpoint attached to a panel.
///
/// The attribute set depends on the hardware (`channel`, `state`, `power`,
/// `mode`, ...), so this stays a string map. Keys serialize in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Device(BTreeMap<String, String>);

impl Device {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set an attribute, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// The `channel` attribute used to address the device on its panel.
    pub fn channel(&self) -> Option<&str> {
        self.get(CHANNEL_ATTR)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Device {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, String>> for Device {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// An addressable group of devices on the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    pub address: String,
    #[serde(default)]
    pub child_dev: Vec<Device>,
}

impl Panel {
    pub fn new(address: impl Into<String>, child_dev: Vec<Device>) -> Self {
        Self {
            address: address.into(),
            child_dev,
        }
    }

    /// First child device whose `channel` attribute equals `channel`.
    pub fn device(&self, channel: &str) -> Option<&Device> {
        self.child_dev.iter().find(|dev| dev.channel() == Some(channel))
    }
}
