//! Authentication credentials.
//!
//! Wire form:
//!
//! ```json
//! { "type": "password", "username": "alice", "password": "secret" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};

use crate::error::{Error, Result};

use super::{WireValue, as_object, discriminator, required_str, wire_serde};

// ============================================================================
// AuthCredentials
// ============================================================================

/// Credentials answering an HTTP authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCredentials {
    /// Username and password (wire tag `password`).
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
}

impl AuthCredentials {
    /// Creates username/password credentials.
    #[inline]
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl WireValue for AuthCredentials {
    const FAMILY: &'static str = "network.AuthCredentials";

    fn encode(&self) -> Value {
        match self {
            Self::Basic { username, password } => json!({
                "type": "password",
                "username": username,
                "password": password,
            }),
        }
    }

    fn decode(value: &Value) -> Result<Self> {
        let object = as_object(value, Self::FAMILY)?;
        match discriminator(object, "type", Self::FAMILY)? {
            "password" => Ok(Self::Basic {
                username: required_str(object, "username", Self::FAMILY)?.to_string(),
                password: required_str(object, "password", Self::FAMILY)?.to_string(),
            }),
            other => Err(Error::unknown_variant(Self::FAMILY, other)),
        }
    }
}

wire_serde!(AuthCredentials);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_basic() {
        let credentials = AuthCredentials::basic("alice", "secret");
        assert_eq!(
            credentials.encode(),
            json!({ "type": "password", "username": "alice", "password": "secret" })
        );
    }

    #[test]
    fn test_round_trip() {
        let credentials = AuthCredentials::basic("bob", "hunter2");
        let decoded = AuthCredentials::decode(&credentials.encode()).expect("decode");
        assert_eq!(decoded, credentials);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = AuthCredentials::decode(&json!({ "type": "digest", "username": "a" }))
            .unwrap_err();
        match err {
            Error::UnknownVariant { family, tag } => {
                assert_eq!(family, "network.AuthCredentials");
                assert_eq!(tag, "digest");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_password_is_decode_error() {
        let err = AuthCredentials::decode(&json!({ "type": "password", "username": "a" }))
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_serde_delegates_to_codec() {
        let credentials: AuthCredentials = serde_json::from_str(
            r#"{"type":"password","username":"u","password":"p"}"#,
        )
        .expect("parse");
        assert_eq!(credentials, AuthCredentials::basic("u", "p"));
        assert!(serde_json::from_str::<AuthCredentials>(r#"{"type":"nope"}"#).is_err());
    }
}
