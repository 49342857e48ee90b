// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved response id with no correlation: the background instructs the
/// popup to close itself.
pub const CLOSE_WINDOW_SIGNAL: &str = "CLOSE_WINDOW";

/// Request types understood by the background process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    #[serde(rename = "STATE/GET")]
    GetState,
    #[serde(rename = "STATE/SUBSCRIBE")]
    SubscribeState,
    #[serde(rename = "GAS_PRICES/GET")]
    GetGasPrices,
    #[serde(rename = "GAS_PRICES/SUBSCRIBE")]
    SubscribeGasPrices,
    #[serde(rename = "EXCHANGE_RATES/GET")]
    GetExchangeRates,
    #[serde(rename = "EXCHANGE_RATES/SUBSCRIBE")]
    SubscribeExchangeRates,
    #[serde(rename = "ACTIVITY_LIST/GET")]
    GetActivityList,
    #[serde(rename = "ACTIVITY_LIST/SUBSCRIBE")]
    SubscribeActivityList,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: String,
    pub message: RequestKind,
    #[serde(default)]
    pub request: Value,
}

/// One inbound message: a one-shot response, a structured error, or a push
/// update for a live subscription. `error` carries a JSON-encoded
/// [`WireError`](crate::error::WireError).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Value>,
}

impl ResponseEnvelope {
    pub fn ok(id: String, response: Value) -> Self {
        Self {
            id,
            response: Some(response),
            error: None,
            subscription: None,
        }
    }

    pub fn error(id: String, error: &str) -> Self {
        Self {
            id,
            response: None,
            error: Some(error.to_string()),
            subscription: None,
        }
    }

    pub fn push(id: String, update: Value) -> Self {
        Self {
            id,
            response: None,
            error: None,
            subscription: Some(update),
        }
    }
}

/// Allocates a request id: `${unix_ms}.${counter}`. Unique for the lifetime
/// of one channel only; ids from a torn-down channel are never routed.
pub(crate) fn request_id(counter: u64) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("{millis}.{counter}")
}
