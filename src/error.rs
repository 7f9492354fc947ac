// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

/// All errors that can occur in the gateway hub library.
///
/// A cache or lookup miss is not an error: those return `Option::None`.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Failed to encode command payload: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("Encryption failed: {reason}")]
    Encryption { reason: String },

    #[error("Decryption failed: {reason}")]
    Decryption { reason: String },

    #[error("Invalid encryption key: expected {expected} bytes, got {actual}")]
    InvalidKey { expected: usize, actual: usize },

    #[error("Malformed status payload: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("MQTT client error: {0}")]
    MqttClient(#[from] rumqttc::ClientError),

    #[error("MQTT connection error: {0}")]
    MqttConnection(#[from] rumqttc::ConnectionError),

    #[error("Bus is not connected")]
    NotConnected,

    #[error("Bus is already connected")]
    AlreadyConnected,

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },
}

impl HubError {
    /// Whether this error came from the message bus rather than the payload.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HubError::MqttClient(_)
                | HubError::MqttConnection(_)
                | HubError::NotConnected
                | HubError::AlreadyConnected
        )
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
