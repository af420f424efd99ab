//! Metadata value model.
//!
//! Grant attributes, artifact metadata and ID token claims are all
//! [`Metadata`] maps. Besides JSON-like primitives a value may hold one of a
//! closed set of [`TypedValue`]s; there is no way to name any other type.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use url::Url;

/// Ordered map of metadata entries.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A single metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Finite 64-bit float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    List(Vec<MetaValue>),
    /// Nested map.
    Map(Metadata),
    /// One of the allow-listed domain types.
    Typed(TypedValue),
}

impl MetaValue {
    /// Returns the string content, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the nested map, if this is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&Metadata> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the list content, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[MetaValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the typed value, if this is one.
    #[must_use]
    pub fn as_typed(&self) -> Option<&TypedValue> {
        match self {
            Self::Typed(t) => Some(t),
            _ => None,
        }
    }

    /// Returns `true` for [`MetaValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Vec<MetaValue>> for MetaValue {
    fn from(value: Vec<MetaValue>) -> Self {
        Self::List(value)
    }
}

impl From<Metadata> for MetaValue {
    fn from(value: Metadata) -> Self {
        Self::Map(value)
    }
}

impl From<TypedValue> for MetaValue {
    fn from(value: TypedValue) -> Self {
        Self::Typed(value)
    }
}

impl From<OffsetDateTime> for MetaValue {
    fn from(value: OffsetDateTime) -> Self {
        Self::Typed(TypedValue::Instant(value))
    }
}

impl From<Url> for MetaValue {
    fn from(value: Url) -> Self {
        Self::Typed(TypedValue::Url(value))
    }
}

// =============================================================================
// Typed Values
// =============================================================================

/// The closed set of domain types that may appear inside metadata.
///
/// Adding a variant means adding an encoder and an entry in the codec's
/// decoder table; nothing else can be reconstructed from stored payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// A point in time.
    Instant(OffsetDateTime),
    /// A signed duration.
    Duration(Duration),
    /// An absolute URL.
    Url(Url),
    /// An unordered set of strings (scopes, audiences, authorities).
    StringSet(BTreeSet<String>),
    /// The authorization request that started the grant.
    AuthorizationRequest(AuthorizationRequestSnapshot),
    /// The authenticated principal that approved the grant.
    Principal(PrincipalSnapshot),
}

impl TypedValue {
    /// Returns the discriminator tag written to storage.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Instant(_) => super::INSTANT_TAG,
            Self::Duration(_) => super::DURATION_TAG,
            Self::Url(_) => super::URL_TAG,
            Self::StringSet(_) => super::SET_TAG,
            Self::AuthorizationRequest(_) => super::AUTHORIZATION_REQUEST_TAG,
            Self::Principal(_) => super::PRINCIPAL_TAG,
        }
    }
}

/// Snapshot of an OAuth 2.0 authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationRequestSnapshot {
    /// Authorization endpoint the request was sent to.
    pub authorization_uri: String,

    /// Requested response type (e.g. `code`).
    pub response_type: String,

    /// Client identifier from the request.
    pub client_id: String,

    /// Redirect URI from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Requested scopes.
    #[serde(default)]
    pub scopes: BTreeSet<String>,

    /// Client-provided `state` parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Remaining request parameters (e.g. `code_challenge`, `nonce`).
    #[serde(default)]
    pub additional_parameters: BTreeMap<String, String>,

    /// Full request URI, when the request was pushed or reconstructed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_request_uri: Option<String>,
}

impl AuthorizationRequestSnapshot {
    /// Creates a snapshot with the mandatory fields.
    #[must_use]
    pub fn new(
        authorization_uri: impl Into<String>,
        response_type: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            authorization_uri: authorization_uri.into(),
            response_type: response_type.into(),
            client_id: client_id.into(),
            redirect_uri: None,
            scopes: BTreeSet::new(),
            state: None,
            additional_parameters: BTreeMap::new(),
            authorization_request_uri: None,
        }
    }
}

/// Snapshot of an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrincipalSnapshot {
    /// Principal name (subject).
    pub name: String,

    /// Granted authorities.
    #[serde(default)]
    pub authorities: BTreeSet<String>,

    /// Whether the principal completed authentication.
    #[serde(default)]
    pub authenticated: bool,

    /// How the principal authenticated (e.g. `pwd`, `federated:google`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_method: Option<String>,

    /// Free-form string details (remote address, session id, ...).
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl PrincipalSnapshot {
    /// Creates an authenticated principal snapshot.
    #[must_use]
    pub fn authenticated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authorities: BTreeSet::new(),
            authenticated: true,
            authentication_method: None,
            details: BTreeMap::new(),
        }
    }
}
