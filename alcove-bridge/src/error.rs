#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Channel disconnected")]
    Disconnected,

    #[error("Channel is reconnecting; the request is safe to retry")]
    Reconnecting,

    #[error("Not connected to the background process")]
    NotConnected,

    #[error("Background error: {message}")]
    Application {
        name: Option<String>,
        message: String,
        stack: Option<String>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Whether retrying the same request after the channel settles makes
    /// sense. Application errors are final for the request that caused them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::Reconnecting | Self::NotConnected
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// The JSON error shape the background process embeds in a response's
/// `error` field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl WireError {
    /// Decodes the embedded error JSON, falling back to treating the raw
    /// string as the message when it is not valid JSON.
    pub fn decode(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Self {
            message: raw.to_string(),
            name: None,
            stack: None,
        })
    }

    pub fn into_error(self) -> BridgeError {
        BridgeError::Application {
            name: self.name,
            message: self.message,
            stack: self.stack,
        }
    }
}
