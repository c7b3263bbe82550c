//! Push messaging over a WebSocket connection
//!
//! The backend pushes stock/sale/prediction/alert events to the gateway and
//! receives events the gateway produces. Delivery intent is at-least-once
//! with no deduplication: envelopes queued during a disconnection are
//! re-sent verbatim after reconnect, so a non-idempotent backend may see
//! duplicate side effects.

pub mod client;
pub mod queue;

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub use client::{
    ConnectionStatus, PushClient, PushConfig, SendOutcome, Subscription, SubscriptionId,
};
pub use queue::OutgoingQueue;

/// Kind tag routing a push envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Stock,
    Sale,
    Waste,
    Prediction,
    Validation,
    Alert,
    Ping,
    Pong,
}

/// JSON envelope framing every push message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Kind tag used for subscriber routing
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,

    /// Kind-specific payload; absent on heartbeat frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// RFC 3339 construction time
    pub timestamp: String,

    /// Originating user, when known
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Envelope {
    /// Create an envelope with the current timestamp.
    #[must_use]
    pub fn new(kind: EnvelopeKind, data: serde_json::Value, user_id: Option<String>) -> Self {
        Self {
            kind,
            data: Some(data),
            timestamp: Utc::now().to_rfc3339(),
            user_id,
        }
    }

    /// Create a heartbeat frame.
    #[must_use]
    pub fn ping() -> Self {
        Self {
            kind: EnvelopeKind::Ping,
            data: None,
            timestamp: Utc::now().to_rfc3339(),
            user_id: None,
        }
    }
}
