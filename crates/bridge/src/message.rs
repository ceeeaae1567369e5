use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BridgeError;

/// Current envelope schema version.
pub const ENVELOPE_VERSION: u16 = 1;

/// Wire envelope for one request or reply.
///
/// The envelope itself is MessagePack; `payload` holds the JSON encoding of a
/// [`Request`](crate::Request) or [`Response`](crate::Response). Replies reuse
/// the request's `correlation_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Request type (e.g. `ADD_RULE`) or `reply`. Used for logging only.
    pub topic: String,

    /// JSON-encoded body bytes.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,

    /// When this message was created.
    pub timestamp: DateTime<Utc>,

    /// Matches a reply to the request that caused it.
    pub correlation_id: Uuid,

    /// Schema version; envelopes without one are treated as version 1.
    #[serde(default = "default_version")]
    pub version: u16,
}

fn default_version() -> u16 {
    ENVELOPE_VERSION
}

impl Message {
    /// Create a new message with a fresh correlation id.
    pub fn new<T: Serialize>(topic: impl Into<String>, body: &T) -> Result<Self, BridgeError> {
        Self::with_correlation(topic, body, Uuid::new_v4())
    }

    /// Create a message with an explicit correlation id (for replies).
    pub fn with_correlation<T: Serialize>(
        topic: impl Into<String>,
        body: &T,
        correlation_id: Uuid,
    ) -> Result<Self, BridgeError> {
        Ok(Self {
            topic: topic.into(),
            payload: serde_json::to_vec(body)?,
            timestamp: Utc::now(),
            correlation_id,
            version: ENVELOPE_VERSION,
        })
    }

    /// Deserialize the body into the expected type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, BridgeError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Serialize this envelope to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BridgeError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    /// Deserialize an envelope from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BridgeError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Encode `Vec<u8>` as a MessagePack bin rather than an array of integers.
mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(d)?;
        Ok(bytes.to_vec())
    }
}
