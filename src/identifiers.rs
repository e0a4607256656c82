//! Type-safe identifier wrappers.
//!
//! Each identifier is a newtype so that, for example, an [`InterceptId`]
//! can never be passed where a [`RequestId`] is expected.
//!
//! | Identifier | Assigned by | Wire form |
//! |------------|-------------|-----------|
//! | [`CommandId`] | Broker | `u64` |
//! | [`SubscriptionId`] | Broker (local only) | - |
//! | [`InterceptId`] | Remote end | string |
//! | [`RequestId`] | Remote end | string |
//! | [`ContextId`] | Remote end | string |
//! | [`NavigationId`] | Remote end | string |
//! | [`RealmId`] | Remote end | string |
//! | [`PreloadScriptId`] | Remote end | string |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// CommandId
// ============================================================================

/// Correlation id of an outgoing command.
///
/// Unique for the lifetime of a session and monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// Creates a command id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

/// Local identity of one event subscription.
///
/// Two subscriptions with identical handlers still have distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a subscription id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ============================================================================
// String Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an id from a string.
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Id of a network intercept, assigned by the remote end.
    InterceptId
);

string_id!(
    /// Id of an in-flight network request.
    ///
    /// Stable across redirects of the same request.
    RequestId
);

string_id!(
    /// Id of a browsing context (tab, window or frame).
    ContextId
);

string_id!(
    /// Id of a navigation.
    NavigationId
);

string_id!(
    /// Id of a script realm.
    RealmId
);

string_id!(
    /// Id of a preload script.
    PreloadScriptId
);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_id_is_transparent() {
        let json = serde_json::to_string(&CommandId::new(42)).expect("serialize");
        assert_eq!(json, "42");

        let id: CommandId = serde_json::from_str("7").expect("parse");
        assert_eq!(id.as_u64(), 7);
    }

    #[test]
    fn test_string_id_is_transparent() {
        let id = InterceptId::new("abc-123");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, r#""abc-123""#);

        let back: InterceptId = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, id);
    }

    #[test]
    fn test_display() {
        assert_eq!(RequestId::new("req-1").to_string(), "req-1");
        assert_eq!(SubscriptionId::new(3).to_string(), "sub-3");
        assert_eq!(CommandId::new(12).to_string(), "12");
    }

    #[test]
    fn test_ordering() {
        assert!(CommandId::new(1) < CommandId::new(2));
    }
}
