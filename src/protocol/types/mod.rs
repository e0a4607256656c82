//! Polymorphic wire value families.
//!
//! Every family is a closed Rust enum. Decoding dispatches on the family's
//! discriminator (usually the `type` field) into exactly one variant; an
//! unrecognized discriminator is an [`Error::UnknownVariant`], never a
//! fallback variant.
//!
//! | Module | Families |
//! |--------|----------|
//! | `auth` | [`AuthCredentials`] |
//! | `bytes` | [`BytesValue`] |
//! | `script` | [`LocalValue`], [`EvaluateResult`] |
//! | `url_pattern` | [`UrlPattern`] |
//! | `target` | [`Target`] |
//! | `network` | Plain network records (headers, cookies, request/response data) |
//!
//! The families implement [`WireValue`]; their serde impls delegate to it so
//! they can be embedded in derived command and event structs.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// WireValue
// ============================================================================

/// A closed polymorphic value family with a wire representation.
///
/// Implementations must round-trip: `decode(&v.encode()) == Ok(v)`.
pub trait WireValue: Sized {
    /// Family name used in decode errors.
    const FAMILY: &'static str;

    /// Encodes the value into its wire form.
    fn encode(&self) -> Value;

    /// Decodes a wire value into exactly one variant.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownVariant`] if the discriminator is not recognized
    /// - [`Error::Decode`] if the discriminator is missing or the payload is malformed
    fn decode(value: &Value) -> Result<Self>;
}

/// Implements serde traits for a [`WireValue`] family by delegation.
macro_rules! wire_serde {
    ($ty:ty) => {
        impl ::serde::Serialize for $ty {
            fn serialize<S: ::serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::std::result::Result<S::Ok, S::Error> {
                ::serde::Serialize::serialize(
                    &$crate::protocol::types::WireValue::encode(self),
                    serializer,
                )
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $ty {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::std::result::Result<Self, D::Error> {
                let value = <::serde_json::Value as ::serde::Deserialize>::deserialize(deserializer)?;
                <$ty as $crate::protocol::types::WireValue>::decode(&value)
                    .map_err(::serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use wire_serde;

// ============================================================================
// Submodules
// ============================================================================

/// Authentication credentials.
pub mod auth;

/// Byte payloads.
pub mod bytes;

/// Network records shared by commands and events.
pub mod network;

/// Script values and evaluation results.
pub mod script;

/// Script evaluation targets.
pub mod target;

/// URL match patterns.
pub mod url_pattern;

// ============================================================================
// Re-exports
// ============================================================================

pub use auth::AuthCredentials;
pub use bytes::BytesValue;
pub use network::{
    AuthChallenge, ContinueWithAuthAction, Cookie, CookieHeader, FetchTimingInfo, Header,
    Initiator, InterceptPhase, RequestData, ResponseContent, ResponseData, SameSite,
    SetCookieHeader,
};
pub use script::{
    EvaluateResult, ExceptionDetails, LocalValue, MappingKey, RemoteReference, RemoteValue,
    ResultOwnership,
};
pub use target::Target;
pub use url_pattern::{UrlPattern, UrlPatternPattern};

// ============================================================================
// Decode Helpers
// ============================================================================

/// Returns the value as a JSON object.
pub(crate) fn as_object<'a>(value: &'a Value, family: &'static str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::decode(family, format!("expected an object, got {value}")))
}

/// Returns the string discriminator stored under `field`.
pub(crate) fn discriminator<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    family: &'static str,
) -> Result<&'a str> {
    match object.get(field) {
        Some(Value::String(tag)) => Ok(tag.as_str()),
        Some(other) => Err(Error::decode(
            family,
            format!("discriminator `{field}` must be a string, got {other}"),
        )),
        None => Err(Error::decode(family, format!("missing discriminator `{field}`"))),
    }
}

/// Returns a required string field.
pub(crate) fn required_str<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    family: &'static str,
) -> Result<&'a str> {
    object
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::decode(family, format!("missing string field `{field}`")))
}

/// Returns an optional string field, rejecting non-string values.
pub(crate) fn optional_str(
    object: &Map<String, Value>,
    field: &str,
    family: &'static str,
) -> Result<Option<String>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::decode(
            family,
            format!("field `{field}` must be a string, got {other}"),
        )),
    }
}

/// Deserializes a payload with serde, mapping failures to [`Error::Decode`].
pub(crate) fn payload<T: DeserializeOwned>(value: &Value, family: &'static str) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|e| Error::decode(family, e.to_string()))
}
