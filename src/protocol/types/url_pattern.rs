//! URL match patterns used to scope network intercepts.
//!
//! ```json
//! { "type": "pattern", "hostname": "example.com", "pathname": "/api/" }
//! { "type": "string", "pattern": "https://example.com/api/" }
//! ```
//!
//! The remote end does the authoritative matching; [`UrlPattern::matches`]
//! mirrors it locally so callers can pre-check scopes.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::error::{Error, Result};

use super::{WireValue, as_object, discriminator, payload, required_str, wire_serde};

// ============================================================================
// UrlPatternPattern
// ============================================================================

/// Structured pattern. Absent components match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlPatternPattern {
    /// Scheme without the trailing `:`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Host name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Port as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Path, starting with `/`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pathname: Option<String>,
    /// Query without the leading `?`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl UrlPatternPattern {
    /// Sets the protocol.
    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Sets the hostname.
    #[inline]
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Sets the port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port.to_string());
        self
    }

    /// Sets the pathname.
    #[inline]
    #[must_use]
    pub fn with_pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = Some(pathname.into());
        self
    }

    /// Sets the search component.
    #[inline]
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }
}

// ============================================================================
// UrlPattern
// ============================================================================

/// A URL match pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPattern {
    /// Component-wise pattern.
    Pattern(UrlPatternPattern),
    /// A URL string; every component it specifies must match.
    String {
        /// The pattern URL.
        pattern: String,
    },
}

impl UrlPattern {
    /// Creates a raw string pattern.
    #[inline]
    #[must_use]
    pub fn string(pattern: impl Into<String>) -> Self {
        Self::String {
            pattern: pattern.into(),
        }
    }

    /// Creates a structured pattern matching every component of `url`.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        Self::Pattern(components_of(url))
    }

    /// Returns `true` if `url` falls inside this pattern.
    ///
    /// Protocol and hostname compare case-insensitively; ports compare after
    /// applying the scheme's default port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a string pattern is not a valid URL.
    pub fn matches(&self, url: &Url) -> Result<bool> {
        let pattern = match self {
            Self::Pattern(pattern) => pattern.clone(),
            Self::String { pattern } => {
                let parsed = Url::parse(pattern).map_err(|e| {
                    Error::invalid_argument(format!("invalid URL pattern {pattern:?}: {e}"))
                })?;
                components_of(&parsed)
            }
        };

        let port = url.port_or_known_default().map(|p| p.to_string());
        let checks = [
            component_matches(&pattern.protocol, Some(url.scheme()), true),
            component_matches(&pattern.hostname, url.host_str(), true),
            component_matches(&pattern.port, port.as_deref(), false),
            component_matches(&pattern.pathname, Some(url.path()), false),
            component_matches(&pattern.search, Some(url.query().unwrap_or("")), false),
        ];
        Ok(checks.iter().all(|ok| *ok))
    }
}

/// Splits a URL into a fully specified structured pattern.
fn components_of(url: &Url) -> UrlPatternPattern {
    UrlPatternPattern {
        protocol: Some(url.scheme().to_string()),
        hostname: url.host_str().map(str::to_string),
        port: url.port_or_known_default().map(|p| p.to_string()),
        pathname: Some(url.path().to_string()),
        search: url.query().map(str::to_string),
    }
}

/// Compares one pattern component; `None` in the pattern matches anything.
fn component_matches(expected: &Option<String>, actual: Option<&str>, ignore_case: bool) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let expected = expected.trim_end_matches(':').trim_start_matches('?');
    match actual {
        Some(actual) if ignore_case => expected.eq_ignore_ascii_case(actual),
        Some(actual) => expected == actual,
        None => expected.is_empty(),
    }
}

impl From<UrlPatternPattern> for UrlPattern {
    fn from(pattern: UrlPatternPattern) -> Self {
        Self::Pattern(pattern)
    }
}

impl WireValue for UrlPattern {
    const FAMILY: &'static str = "network.UrlPattern";

    fn encode(&self) -> Value {
        match self {
            Self::Pattern(pattern) => {
                let mut value = serde_json::to_value(pattern).unwrap_or_else(|_| json!({}));
                if let Value::Object(object) = &mut value {
                    object.insert("type".into(), Value::String("pattern".into()));
                }
                value
            }
            Self::String { pattern } => json!({ "type": "string", "pattern": pattern }),
        }
    }

    fn decode(value: &Value) -> Result<Self> {
        let object = as_object(value, Self::FAMILY)?;
        match discriminator(object, "type", Self::FAMILY)? {
            "pattern" => {
                let mut fields = object.clone();
                fields.remove("type");
                Ok(Self::Pattern(payload(&Value::Object(fields), Self::FAMILY)?))
            }
            "string" => Ok(Self::string(required_str(object, "pattern", Self::FAMILY)?)),
            other => Err(Error::unknown_variant(Self::FAMILY, other)),
        }
    }
}

wire_serde!(UrlPattern);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid url")
    }

    #[test]
    fn test_pattern_encoding_skips_absent_components() {
        let pattern = UrlPattern::from(
            UrlPatternPattern::default()
                .with_hostname("example.com")
                .with_pathname("/api"),
        );
        assert_eq!(
            pattern.encode(),
            json!({ "type": "pattern", "hostname": "example.com", "pathname": "/api" })
        );
        assert_eq!(UrlPattern::decode(&pattern.encode()).expect("decode"), pattern);
    }

    #[test]
    fn test_string_round_trip() {
        let pattern = UrlPattern::string("https://example.com/");
        assert_eq!(
            pattern.encode(),
            json!({ "type": "string", "pattern": "https://example.com/" })
        );
        assert_eq!(UrlPattern::decode(&pattern.encode()).expect("decode"), pattern);
    }

    #[test]
    fn test_unknown_type() {
        let err = UrlPattern::decode(&json!({ "type": "glob", "pattern": "*" })).unwrap_err();
        assert!(matches!(err, Error::UnknownVariant { tag, .. } if tag == "glob"));
    }

    #[test]
    fn test_pattern_rejects_unknown_fields_type() {
        let err = UrlPattern::decode(&json!({ "type": "pattern", "port": 443 })).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_matches_hostname_only() {
        let pattern = UrlPattern::from(UrlPatternPattern::default().with_hostname("Example.COM"));
        assert!(pattern.matches(&url("https://example.com/a?b=1")).expect("match"));
        assert!(!pattern.matches(&url("https://other.com/")).expect("match"));
    }

    #[test]
    fn test_matches_default_port() {
        let pattern = UrlPattern::from(UrlPatternPattern::default().with_port(443));
        assert!(pattern.matches(&url("https://example.com/")).expect("match"));
        assert!(!pattern.matches(&url("http://example.com/")).expect("match"));
    }

    #[test]
    fn test_string_pattern_matches_exact_url() {
        let pattern = UrlPattern::string("https://example.com/api?x=1");
        assert!(pattern.matches(&url("https://example.com/api?x=1")).expect("match"));
        assert!(!pattern.matches(&url("https://example.com/api")).expect("match"));
    }

    #[test]
    fn test_invalid_string_pattern() {
        let pattern = UrlPattern::string("not a url");
        assert!(pattern.matches(&url("https://example.com/")).is_err());
    }
}
