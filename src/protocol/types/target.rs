//! Script evaluation targets.
//!
//! A target names either a realm directly or a browsing context (optionally
//! a named sandbox inside it). The variant is selected by which key is
//! present rather than by a `type` field:
//!
//! ```json
//! { "realm": "realm-1" }
//! { "context": "ctx-1", "sandbox": "isolated" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{ContextId, RealmId};

use super::{WireValue, as_object, optional_str, required_str, wire_serde};

// ============================================================================
// Target
// ============================================================================

/// Where a script runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A specific realm.
    Realm {
        /// Realm id.
        realm: RealmId,
    },
    /// The default realm of a browsing context, or a sandbox within it.
    Context {
        /// Browsing context id.
        context: ContextId,
        /// Sandbox name.
        sandbox: Option<String>,
    },
}

impl Target {
    /// Targets a realm.
    #[inline]
    #[must_use]
    pub fn realm(realm: impl Into<RealmId>) -> Self {
        Self::Realm {
            realm: realm.into(),
        }
    }

    /// Targets the default realm of a browsing context.
    #[inline]
    #[must_use]
    pub fn context(context: impl Into<ContextId>) -> Self {
        Self::Context {
            context: context.into(),
            sandbox: None,
        }
    }

    /// Targets a named sandbox inside a browsing context.
    #[inline]
    #[must_use]
    pub fn sandbox(context: impl Into<ContextId>, sandbox: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            sandbox: Some(sandbox.into()),
        }
    }
}

impl WireValue for Target {
    const FAMILY: &'static str = "script.Target";

    fn encode(&self) -> Value {
        let mut object = Map::new();
        match self {
            Self::Realm { realm } => {
                object.insert("realm".into(), Value::String(realm.to_string()));
            }
            Self::Context { context, sandbox } => {
                object.insert("context".into(), Value::String(context.to_string()));
                if let Some(sandbox) = sandbox {
                    object.insert("sandbox".into(), Value::String(sandbox.clone()));
                }
            }
        }
        Value::Object(object)
    }

    fn decode(value: &Value) -> Result<Self> {
        let object = as_object(value, Self::FAMILY)?;
        match (object.contains_key("realm"), object.contains_key("context")) {
            (true, false) => Ok(Self::Realm {
                realm: RealmId::new(required_str(object, "realm", Self::FAMILY)?),
            }),
            (false, true) => Ok(Self::Context {
                context: ContextId::new(required_str(object, "context", Self::FAMILY)?),
                sandbox: optional_str(object, "sandbox", Self::FAMILY)?,
            }),
            (true, true) => Err(Error::decode(
                Self::FAMILY,
                "both `realm` and `context` are present",
            )),
            (false, false) => Err(Error::decode(
                Self::FAMILY,
                "missing discriminator: expected `realm` or `context`",
            )),
        }
    }
}

wire_serde!(Target);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_realm_target() {
        let target = Target::realm("realm-1");
        assert_eq!(target.encode(), json!({ "realm": "realm-1" }));
        assert_eq!(Target::decode(&target.encode()).expect("decode"), target);
    }

    #[test]
    fn test_context_target_without_sandbox() {
        let target = Target::context("ctx-1");
        assert_eq!(target.encode(), json!({ "context": "ctx-1" }));
    }

    #[test]
    fn test_sandbox_round_trip() {
        let target = Target::sandbox("ctx-1", "isolated");
        assert_eq!(
            target.encode(),
            json!({ "context": "ctx-1", "sandbox": "isolated" })
        );
        assert_eq!(Target::decode(&target.encode()).expect("decode"), target);
    }

    #[test]
    fn test_ambiguous_target_is_rejected() {
        let err = Target::decode(&json!({ "realm": "r", "context": "c" })).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_empty_target_is_rejected() {
        let err = Target::decode(&json!({ "sandbox": "x" })).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
