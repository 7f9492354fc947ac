// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

/// Topic format for commands addressed to one gateway: `/receive/<device_no>`.
pub const RECEIVE_TOPIC_PREFIX: &str = "/receive/";

/// Shared topic on which every gateway reports its status.
pub const SEND_DEVICES_TOPIC: &str = "/send/devices";

/// Command name carried by SetPanels payloads.
pub const SET_PANELS: &str = "set_panels";

/// Command name carried by ReadStatus requests and status reports.
pub const READ_STATUS: &str = "read_status";

/// Device attribute holding the channel number used for lookups.
pub const CHANNEL_ATTR: &str = "channel";

/// Triple-DES key length in bytes.
pub const KEY_LEN: usize = 24;

/// CBC initialization vector length (one DES block).
pub const IV_LEN: usize = 8;

/// Default broker endpoint when none is configured.
pub const DEFAULT_BROKER: &str = "localhost:1883";

/// Result value reported by the gateway for a successful command.
pub const RESULT_OK: &str = "1";

/// Build the per-device command topic.
pub fn receive_topic(device_no: &str) -> String {
    format!("{RECEIVE_TOPIC_PREFIX}{device_no}")
}
