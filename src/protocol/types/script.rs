//! Script values and evaluation results.
//!
//! [`LocalValue`] is what the client sends as function arguments; it is a
//! closed family keyed on `type`, plus [`RemoteReference`] for objects that
//! already live in the remote realm (those carry no `type`).
//!
//! [`RemoteValue`] is what the remote end sends back. It is kept as a loose
//! record: the client only inspects its type name, primitive value and handle.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value, json};

use crate::error::{Error, Result};
use crate::identifiers::RealmId;

use super::{WireValue, as_object, discriminator, optional_str, payload, required_str, wire_serde};

// ============================================================================
// RemoteReference
// ============================================================================

/// Reference to an object held by the remote end.
///
/// At least one of the handle and the shared id is set; the constructors
/// are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReference {
    handle: Option<String>,
    shared_id: Option<String>,
}

impl RemoteReference {
    /// References an object by handle.
    #[inline]
    #[must_use]
    pub fn handle(handle: impl Into<String>) -> Self {
        Self {
            handle: Some(handle.into()),
            shared_id: None,
        }
    }

    /// References a node by shared id.
    #[inline]
    #[must_use]
    pub fn shared(shared_id: impl Into<String>) -> Self {
        Self {
            handle: None,
            shared_id: Some(shared_id.into()),
        }
    }

    /// Adds a handle to a shared-id reference.
    #[inline]
    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Returns the handle, if any (`ResultOwnership::Root`).
    #[inline]
    #[must_use]
    pub fn as_handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    /// Returns the shared id of a DOM node, if any.
    #[inline]
    #[must_use]
    pub fn shared_id(&self) -> Option<&str> {
        self.shared_id.as_deref()
    }

    /// Builds a reference from optional parts; `None` when both are absent.
    fn from_parts(handle: Option<String>, shared_id: Option<String>) -> Option<Self> {
        (handle.is_some() || shared_id.is_some()).then_some(Self { handle, shared_id })
    }
}

// ============================================================================
// LocalValue
// ============================================================================

/// Key of a `map` or `object` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingKey {
    /// Plain string key.
    String(String),
    /// Arbitrary value key.
    Value(LocalValue),
}

/// A value serialized by the client into a remote realm.
///
/// `Number` carries IEEE special values; they travel as the strings `NaN`,
/// `-0`, `Infinity` and `-Infinity`.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalValue {
    /// `undefined`.
    Undefined,
    /// `null`.
    Null,
    /// A string.
    String(String),
    /// A number.
    Number(f64),
    /// A boolean.
    Boolean(bool),
    /// A `BigInt`, as its decimal string.
    BigInt(String),
    /// An array.
    Array(Vec<LocalValue>),
    /// A `Date`, as an ISO 8601 string.
    Date(String),
    /// A `Map`.
    Map(Vec<(MappingKey, LocalValue)>),
    /// A plain object.
    Object(Vec<(MappingKey, LocalValue)>),
    /// A `RegExp`.
    RegExp {
        /// Pattern source.
        pattern: String,
        /// Flags, e.g. `gi`.
        flags: Option<String>,
    },
    /// A `Set`.
    Set(Vec<LocalValue>),
    /// An object that already lives in the remote realm.
    Reference(RemoteReference),
}

impl LocalValue {
    /// Creates a string value.
    #[inline]
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Creates an object from string-keyed entries.
    #[must_use]
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, LocalValue)>) -> Self {
        Self::Object(
            entries
                .into_iter()
                .map(|(k, v)| (MappingKey::String(k.into()), v))
                .collect(),
        )
    }
}

impl From<&str> for LocalValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<f64> for LocalValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for LocalValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Encodes a number, mapping IEEE special values to their string forms.
fn encode_number(n: f64) -> Value {
    if n.is_nan() {
        Value::String("NaN".into())
    } else if n == 0.0 && n.is_sign_negative() {
        Value::String("-0".into())
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        Value::String(s.into())
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Decodes a number, accepting the special string forms.
fn decode_number(value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::decode(LocalValue::FAMILY, format!("number out of range: {n}"))),
        Value::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "-0" => Ok(-0.0),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => Err(Error::decode(
                LocalValue::FAMILY,
                format!("unknown special number {other:?}"),
            )),
        },
        other => Err(Error::decode(
            LocalValue::FAMILY,
            format!("number value must be a number or string, got {other}"),
        )),
    }
}

fn encode_list(items: &[LocalValue]) -> Value {
    Value::Array(items.iter().map(WireValue::encode).collect())
}

fn decode_list(value: Option<&Value>) -> Result<Vec<LocalValue>> {
    value
        .and_then(Value::as_array)
        .ok_or_else(|| Error::decode(LocalValue::FAMILY, "`value` must be an array"))?
        .iter()
        .map(LocalValue::decode)
        .collect()
}

fn encode_entries(entries: &[(MappingKey, LocalValue)]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|(key, value)| {
                let key = match key {
                    MappingKey::String(s) => Value::String(s.clone()),
                    MappingKey::Value(v) => v.encode(),
                };
                Value::Array(vec![key, value.encode()])
            })
            .collect(),
    )
}

fn decode_entries(value: Option<&Value>) -> Result<Vec<(MappingKey, LocalValue)>> {
    let entries = value
        .and_then(Value::as_array)
        .ok_or_else(|| Error::decode(LocalValue::FAMILY, "`value` must be an array of pairs"))?;

    entries
        .iter()
        .map(|entry| match entry.as_array().map(Vec::as_slice) {
            Some([Value::String(key), value]) => {
                Ok((MappingKey::String(key.clone()), LocalValue::decode(value)?))
            }
            Some([key, value]) => Ok((
                MappingKey::Value(LocalValue::decode(key)?),
                LocalValue::decode(value)?,
            )),
            _ => Err(Error::decode(
                LocalValue::FAMILY,
                format!("mapping entry must be a [key, value] pair, got {entry}"),
            )),
        })
        .collect()
}

impl WireValue for LocalValue {
    const FAMILY: &'static str = "script.LocalValue";

    fn encode(&self) -> Value {
        match self {
            Self::Undefined => json!({ "type": "undefined" }),
            Self::Null => json!({ "type": "null" }),
            Self::String(s) => json!({ "type": "string", "value": s }),
            Self::Number(n) => json!({ "type": "number", "value": encode_number(*n) }),
            Self::Boolean(b) => json!({ "type": "boolean", "value": b }),
            Self::BigInt(s) => json!({ "type": "bigint", "value": s }),
            Self::Array(items) => json!({ "type": "array", "value": encode_list(items) }),
            Self::Date(s) => json!({ "type": "date", "value": s }),
            Self::Map(entries) => json!({ "type": "map", "value": encode_entries(entries) }),
            Self::Object(entries) => json!({ "type": "object", "value": encode_entries(entries) }),
            Self::RegExp { pattern, flags } => {
                let mut regexp = Map::new();
                regexp.insert("pattern".into(), Value::String(pattern.clone()));
                if let Some(flags) = flags {
                    regexp.insert("flags".into(), Value::String(flags.clone()));
                }
                json!({ "type": "regexp", "value": regexp })
            }
            Self::Set(items) => json!({ "type": "set", "value": encode_list(items) }),
            Self::Reference(reference) => {
                let mut object = Map::new();
                if let Some(handle) = &reference.handle {
                    object.insert("handle".into(), Value::String(handle.clone()));
                }
                if let Some(shared_id) = &reference.shared_id {
                    object.insert("sharedId".into(), Value::String(shared_id.clone()));
                }
                Value::Object(object)
            }
        }
    }

    fn decode(value: &Value) -> Result<Self> {
        let object = as_object(value, Self::FAMILY)?;

        if !object.contains_key("type")
            && (object.contains_key("handle") || object.contains_key("sharedId"))
        {
            return RemoteReference::from_parts(
                optional_str(object, "handle", Self::FAMILY)?,
                optional_str(object, "sharedId", Self::FAMILY)?,
            )
            .map(Self::Reference)
            .ok_or_else(|| Error::decode(Self::FAMILY, "reference without `handle` or `sharedId`"));
        }

        let inner = object.get("value");
        let text = || required_str(object, "value", Self::FAMILY).map(str::to_string);

        match discriminator(object, "type", Self::FAMILY)? {
            "undefined" => Ok(Self::Undefined),
            "null" => Ok(Self::Null),
            "string" => Ok(Self::String(text()?)),
            "number" => {
                let raw = inner.ok_or_else(|| Error::decode(Self::FAMILY, "missing `value`"))?;
                Ok(Self::Number(decode_number(raw)?))
            }
            "boolean" => inner
                .and_then(Value::as_bool)
                .map(Self::Boolean)
                .ok_or_else(|| Error::decode(Self::FAMILY, "`value` must be a boolean")),
            "bigint" => Ok(Self::BigInt(text()?)),
            "array" => Ok(Self::Array(decode_list(inner)?)),
            "date" => Ok(Self::Date(text()?)),
            "map" => Ok(Self::Map(decode_entries(inner)?)),
            "object" => Ok(Self::Object(decode_entries(inner)?)),
            "regexp" => {
                let regexp = inner
                    .and_then(Value::as_object)
                    .ok_or_else(|| Error::decode(Self::FAMILY, "`value` must be an object"))?;
                Ok(Self::RegExp {
                    pattern: required_str(regexp, "pattern", Self::FAMILY)?.to_string(),
                    flags: optional_str(regexp, "flags", Self::FAMILY)?,
                })
            }
            "set" => Ok(Self::Set(decode_list(inner)?)),
            other => Err(Error::unknown_variant(Self::FAMILY, other)),
        }
    }
}

wire_serde!(LocalValue);

// ============================================================================
// RemoteValue
// ============================================================================

/// A value serialized by the remote end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteValue {
    /// Type name, e.g. `string`, `object`, `node`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Serialized value, for types that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Handle, when ownership was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Id shared by every serialization of the same object in one call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    /// Shared id, for DOM nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_id: Option<String>,
}

impl RemoteValue {
    /// Returns the string value if this is a `string`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match (self.kind.as_str(), &self.value) {
            ("string", Some(Value::String(s))) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value if this is a `number`, including special values.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match (self.kind.as_str(), &self.value) {
            ("number", Some(value)) => decode_number(value).ok(),
            _ => None,
        }
    }

    /// Returns the boolean value if this is a `boolean`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match (self.kind.as_str(), &self.value) {
            ("boolean", Some(Value::Bool(b))) => Some(*b),
            _ => None,
        }
    }

    /// Returns a reference usable as a [`LocalValue`] argument, if the
    /// value carries a handle or shared id.
    #[must_use]
    pub fn to_reference(&self) -> Option<LocalValue> {
        RemoteReference::from_parts(self.handle.clone(), self.shared_id.clone())
            .map(LocalValue::Reference)
    }
}

// ============================================================================
// EvaluateResult
// ============================================================================

/// Ownership of values returned by script commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultOwnership {
    /// Keep the value alive and return a handle.
    Root,
    /// Do not retain the value.
    None,
}

/// Details of an exception thrown by evaluated script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Column of the throw site.
    #[serde(default)]
    pub column_number: u64,
    /// The thrown value.
    pub exception: RemoteValue,
    /// Line of the throw site.
    #[serde(default)]
    pub line_number: u64,
    /// Stack trace, kept unparsed.
    #[serde(default)]
    pub stack_trace: Value,
    /// Exception text.
    #[serde(default)]
    pub text: String,
}

/// Result of `script.evaluate` or `script.callFunction`.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluateResult {
    /// The script completed.
    Success {
        /// Returned value.
        result: RemoteValue,
        /// Realm the script ran in.
        realm: RealmId,
    },
    /// The script threw.
    Exception {
        /// Exception details.
        exception_details: ExceptionDetails,
        /// Realm the script ran in.
        realm: RealmId,
    },
}

impl EvaluateResult {
    /// Returns the realm the script ran in.
    #[must_use]
    pub fn realm(&self) -> &RealmId {
        match self {
            Self::Success { realm, .. } | Self::Exception { realm, .. } => realm,
        }
    }

    /// Converts into the returned value, mapping a thrown exception to an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Script`] if the script threw.
    pub fn into_result(self) -> Result<RemoteValue> {
        match self {
            Self::Success { result, .. } => Ok(result),
            Self::Exception {
                exception_details, ..
            } => Err(Error::script(exception_details.text)),
        }
    }
}

impl WireValue for EvaluateResult {
    const FAMILY: &'static str = "script.EvaluateResult";

    fn encode(&self) -> Value {
        match self {
            Self::Success { result, realm } => json!({
                "type": "success",
                "result": result,
                "realm": realm,
            }),
            Self::Exception {
                exception_details,
                realm,
            } => json!({
                "type": "exception",
                "exceptionDetails": exception_details,
                "realm": realm,
            }),
        }
    }

    fn decode(value: &Value) -> Result<Self> {
        let object = as_object(value, Self::FAMILY)?;
        let realm = || required_str(object, "realm", Self::FAMILY).map(RealmId::new);
        let field = |name: &str| {
            object
                .get(name)
                .ok_or_else(|| Error::decode(Self::FAMILY, format!("missing `{name}`")))
        };

        match discriminator(object, "type", Self::FAMILY)? {
            "success" => Ok(Self::Success {
                result: payload(field("result")?, Self::FAMILY)?,
                realm: realm()?,
            }),
            "exception" => Ok(Self::Exception {
                exception_details: payload(field("exceptionDetails")?, Self::FAMILY)?,
                realm: realm()?,
            }),
            other => Err(Error::unknown_variant(Self::FAMILY, other)),
        }
    }
}

wire_serde!(EvaluateResult);

// ============================================================================
// Tests
// ============================================================================
