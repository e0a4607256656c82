//! Byte payloads.
//!
//! Bodies, header values and cookie values travel either as UTF-8 text or as
//! base64:
//!
//! ```json
//! { "type": "string", "value": "hello" }
//! { "type": "base64", "value": "aGVsbG8=" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use serde_json::{Value, json};

use crate::error::{Error, Result};

use super::{WireValue, as_object, discriminator, required_str, wire_serde};

// ============================================================================
// BytesValue
// ============================================================================

/// A byte payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BytesValue {
    /// UTF-8 text.
    String(String),
    /// Base64-encoded bytes (standard alphabet, padded).
    Base64(String),
}

impl BytesValue {
    /// Creates a text payload.
    #[inline]
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Creates a base64 payload from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::Base64(Base64Standard.encode(bytes))
    }

    /// Returns the raw bytes of the payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a base64 payload is not valid base64.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::String(s) => Ok(s.as_bytes().to_vec()),
            Self::Base64(b64) => Base64Standard
                .decode(b64)
                .map_err(|e| Error::decode(Self::FAMILY, e.to_string())),
        }
    }

    /// Returns the text content if this is a string payload.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Base64(_) => None,
        }
    }
}

impl From<&str> for BytesValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for BytesValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl WireValue for BytesValue {
    const FAMILY: &'static str = "network.BytesValue";

    fn encode(&self) -> Value {
        match self {
            Self::String(value) => json!({ "type": "string", "value": value }),
            Self::Base64(value) => json!({ "type": "base64", "value": value }),
        }
    }

    fn decode(value: &Value) -> Result<Self> {
        let object = as_object(value, Self::FAMILY)?;
        let tag = discriminator(object, "type", Self::FAMILY)?;
        let make: fn(String) -> Self = match tag {
            "string" => Self::String,
            "base64" => Self::Base64,
            other => return Err(Error::unknown_variant(Self::FAMILY, other)),
        };
        Ok(make(required_str(object, "value", Self::FAMILY)?.to_string()))
    }
}

wire_serde!(BytesValue);

// ============================================================================
// Tests
// ============================================================================
