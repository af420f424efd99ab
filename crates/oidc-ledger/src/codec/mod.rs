//! Allow-listed codec for grant attributes and artifact metadata.
//!
//! Metadata is stored as JSON. Primitives, lists and maps map onto their JSON
//! counterparts; typed values are written as an envelope:
//!
//! ```json
//! {"@type": "instant", "value": "2026-01-01T00:00:00Z"}
//! ```
//!
//! Decoding resolves the `@type` tag through a fixed table of decoder
//! functions. A tag outside the table fails with
//! [`DecodeError::DisallowedType`] before any domain value is built. A plain
//! map that itself contains the reserved `@type` key is wrapped in a `map`
//! envelope on encode so it can never be mistaken for a typed value.
//!
//! # Security Considerations
//!
//! - Stored attributes originate from redirect parameters and identity
//!   provider claims and must be treated as hostile
//! - Typed payloads are plain data decoded with `deny_unknown_fields`
//! - Payload size and nesting depth are bounded

pub mod value;

use std::collections::BTreeSet;

use serde_json::{Map, Number, Value};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use url::Url;

use crate::config::CodecConfig;

pub use value::{AuthorizationRequestSnapshot, MetaValue, Metadata, PrincipalSnapshot, TypedValue};

// =============================================================================
// Constants
// =============================================================================

/// Reserved key holding the discriminator of a typed value.
pub const TYPE_KEY: &str = "@type";

/// Key holding the payload of a typed value.
pub const VALUE_KEY: &str = "value";

/// Tag for [`TypedValue::Instant`].
pub const INSTANT_TAG: &str = "instant";
/// Tag for [`TypedValue::Duration`].
pub const DURATION_TAG: &str = "duration";
/// Tag for [`TypedValue::Url`].
pub const URL_TAG: &str = "url";
/// Tag for [`TypedValue::StringSet`].
pub const SET_TAG: &str = "set";
/// Tag for [`TypedValue::AuthorizationRequest`].
pub const AUTHORIZATION_REQUEST_TAG: &str = "authorization_request";
/// Tag for [`TypedValue::Principal`].
pub const PRINCIPAL_TAG: &str = "principal";
/// Escape tag for plain maps containing the reserved key.
pub const MAP_TAG: &str = "map";

/// Default maximum nesting depth of a metadata payload.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default maximum size of an encoded metadata payload.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

type TypedDecoder = fn(Value) -> Result<TypedValue, DecodeError>;

/// The allow-list: every tag that may be decoded into a domain value.
const TYPED_DECODERS: &[(&str, TypedDecoder)] = &[
    (INSTANT_TAG, decode_instant),
    (DURATION_TAG, decode_duration),
    (URL_TAG, decode_url),
    (SET_TAG, decode_string_set),
    (AUTHORIZATION_REQUEST_TAG, decode_authorization_request),
    (PRINCIPAL_TAG, decode_principal),
];

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while decoding a stored metadata payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload root is not a map.
    #[error("payload root must be a map")]
    NotAMap,

    /// The payload names a type outside the allow-list.
    #[error("type '{tag}' is not on the allow-list")]
    DisallowedType {
        /// The rejected tag.
        tag: String,
    },

    /// A typed envelope has a missing tag or unexpected keys.
    #[error("typed value envelope must contain exactly '@type' and 'value'")]
    MalformedEnvelope,

    /// An allow-listed type carried an invalid payload.
    #[error("invalid '{tag}' value: {message}")]
    InvalidTypedValue {
        /// The tag being decoded.
        tag: String,
        /// Why the payload was rejected.
        message: String,
    },

    /// The payload nests deeper than allowed.
    #[error("nesting exceeds the maximum depth of {max}")]
    TooDeep {
        /// Configured maximum depth.
        max: usize,
    },

    /// The payload is larger than allowed.
    #[error("payload of {size} bytes exceeds the maximum of {max} bytes")]
    TooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Configured maximum size.
        max: usize,
    },

    /// A number does not fit a signed 64-bit integer or a float.
    #[error("number {0} is outside the supported range")]
    NumberOutOfRange(String),

    /// A stored row is missing a field required to rebuild a value.
    #[error("missing field: {0}")]
    MissingField(String),
}

impl DecodeError {
    fn invalid(tag: &str, message: impl Into<String>) -> Self {
        Self::InvalidTypedValue {
            tag: tag.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised while encoding metadata for storage.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// NaN and infinities have no JSON representation.
    #[error("non-finite float cannot be stored")]
    NonFiniteFloat,

    /// A typed value could not be rendered.
    #[error("invalid '{tag}' value: {message}")]
    InvalidTypedValue {
        /// The tag being encoded.
        tag: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The value nests deeper than the decoder would accept.
    #[error("nesting exceeds the maximum depth of {max}")]
    TooDeep {
        /// Configured maximum depth.
        max: usize,
    },

    /// The encoded payload is larger than the decoder would accept.
    #[error("payload of {size} bytes exceeds the maximum of {max} bytes")]
    TooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Configured maximum size.
        max: usize,
    },

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Token Codec
// =============================================================================

/// Converts [`Metadata`] maps to and from their stored string form.
///
/// Anything the codec encodes it can decode again with the same limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCodec {
    max_depth: usize,
    max_payload_bytes: usize,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl TokenCodec {
    /// Creates a codec with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec from configuration.
    #[must_use]
    pub fn from_config(config: &CodecConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_payload_bytes: config.max_payload_bytes,
        }
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the maximum payload size in bytes.
    #[must_use]
    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    /// Returns the tags the decoder accepts, in table order.
    pub fn allowed_types() -> impl Iterator<Item = &'static str> {
        TYPED_DECODERS
            .iter()
            .map(|(tag, _)| *tag)
            .chain(std::iter::once(MAP_TAG))
    }

    /// Encodes a metadata map into its stored form.
    ///
    /// # Errors
    ///
    /// Returns an error for non-finite floats, unrenderable typed values, or
    /// payloads exceeding the configured limits.
    pub fn encode(&self, map: &Metadata) -> Result<String, EncodeError> {
        let json = self.map_to_json(map, 1)?;
        let encoded = serde_json::to_string(&json)?;
        if encoded.len() > self.max_payload_bytes {
            return Err(EncodeError::TooLarge {
                size: encoded.len(),
                max: self.max_payload_bytes,
            });
        }
        Ok(encoded)
    }

    /// Decodes a stored payload into a metadata map.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::DisallowedType`] for any tag outside the
    /// allow-list, and other [`DecodeError`]s for malformed or oversized input.
    pub fn decode(&self, payload: &str) -> Result<Metadata, DecodeError> {
        if payload.len() > self.max_payload_bytes {
            return Err(DecodeError::TooLarge {
                size: payload.len(),
                max: self.max_payload_bytes,
            });
        }

        let json: Value = serde_json::from_str(payload)?;
        match self.from_json(json, 1)? {
            MetaValue::Map(map) => Ok(map),
            _ => Err(DecodeError::NotAMap),
        }
    }

    // -------------------------------------------------------------------------
    // Encoding
    // -------------------------------------------------------------------------

    fn map_to_json(&self, map: &Metadata, depth: usize) -> Result<Value, EncodeError> {
        if depth > self.max_depth {
            return Err(EncodeError::TooDeep {
                max: self.max_depth,
            });
        }

        let mut object = Map::with_capacity(map.len());
        for (key, value) in map {
            object.insert(key.clone(), self.to_json(value, depth + 1)?);
        }

        if map.contains_key(TYPE_KEY) {
            Ok(envelope(MAP_TAG, Value::Object(object)))
        } else {
            Ok(Value::Object(object))
        }
    }

    fn to_json(&self, value: &MetaValue, depth: usize) -> Result<Value, EncodeError> {
        if depth > self.max_depth {
            return Err(EncodeError::TooDeep {
                max: self.max_depth,
            });
        }

        Ok(match value {
            MetaValue::Null => Value::Null,
            MetaValue::Bool(b) => Value::Bool(*b),
            MetaValue::Integer(i) => Value::from(*i),
            MetaValue::Float(f) => {
                Value::Number(Number::from_f64(*f).ok_or(EncodeError::NonFiniteFloat)?)
            }
            MetaValue::String(s) => Value::String(s.clone()),
            MetaValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.to_json(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            MetaValue::Map(map) => self.map_to_json(map, depth)?,
            MetaValue::Typed(typed) => envelope(typed.tag(), encode_typed(typed)?),
        })
    }

    // -------------------------------------------------------------------------
    // Decoding
    // -------------------------------------------------------------------------

    fn from_json(&self, value: Value, depth: usize) -> Result<MetaValue, DecodeError> {
        if depth > self.max_depth {
            return Err(DecodeError::TooDeep {
                max: self.max_depth,
            });
        }

        Ok(match value {
            Value::Null => MetaValue::Null,
            Value::Bool(b) => MetaValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MetaValue::Integer(i)
                } else if n.is_f64() {
                    MetaValue::Float(
                        n.as_f64()
                            .ok_or_else(|| DecodeError::NumberOutOfRange(n.to_string()))?,
                    )
                } else {
                    return Err(DecodeError::NumberOutOfRange(n.to_string()));
                }
            }
            Value::String(s) => MetaValue::String(s),
            Value::Array(items) => MetaValue::List(
                items
                    .into_iter()
                    .map(|item| self.from_json(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(object) => {
                if object.contains_key(TYPE_KEY) {
                    self.decode_envelope(object, depth)?
                } else {
                    MetaValue::Map(self.object_to_map(object, depth)?)
                }
            }
        })
    }

    fn object_to_map(&self, object: Map<String, Value>, depth: usize) -> Result<Metadata, DecodeError> {
        object
            .into_iter()
            .map(|(key, value)| Ok((key, self.from_json(value, depth + 1)?)))
            .collect()
    }

    fn decode_envelope(
        &self,
        mut object: Map<String, Value>,
        depth: usize,
    ) -> Result<MetaValue, DecodeError> {
        let tag = match object.get(TYPE_KEY) {
            Some(Value::String(tag)) => tag.clone(),
            _ => return Err(DecodeError::MalformedEnvelope),
        };

        if tag == MAP_TAG {
            return match take_envelope_value(&mut object)? {
                Value::Object(inner) => Ok(MetaValue::Map(self.object_to_map(inner, depth)?)),
                _ => Err(DecodeError::invalid(MAP_TAG, "expected an object")),
            };
        }

        let decoder = TYPED_DECODERS
            .iter()
            .find(|(allowed, _)| *allowed == tag)
            .map(|(_, decoder)| *decoder)
            .ok_or(DecodeError::DisallowedType { tag })?;

        let payload = take_envelope_value(&mut object)?;
        decoder(payload).map(MetaValue::Typed)
    }
}

fn envelope(tag: &str, payload: Value) -> Value {
    let mut object = Map::with_capacity(2);
    object.insert(TYPE_KEY.to_string(), Value::String(tag.to_string()));
    object.insert(VALUE_KEY.to_string(), payload);
    Value::Object(object)
}

fn take_envelope_value(object: &mut Map<String, Value>) -> Result<Value, DecodeError> {
    if object.len() != 2 {
        return Err(DecodeError::MalformedEnvelope);
    }
    object
        .remove(VALUE_KEY)
        .ok_or(DecodeError::MalformedEnvelope)
}

// =============================================================================
// Typed Value Encoders
// =============================================================================

fn encode_typed(value: &TypedValue) -> Result<Value, EncodeError> {
    let invalid = |message: String| EncodeError::InvalidTypedValue {
        tag: value.tag().to_string(),
        message,
    };

    Ok(match value {
        TypedValue::Instant(instant) => {
            Value::String(instant.format(&Rfc3339).map_err(|e| invalid(e.to_string()))?)
        }
        TypedValue::Duration(duration) => serde_json::json!({
            "seconds": duration.whole_seconds(),
            "nanos": duration.subsec_nanoseconds(),
        }),
        TypedValue::Url(url) => Value::String(url.as_str().to_string()),
        TypedValue::StringSet(set) => {
            Value::Array(set.iter().cloned().map(Value::String).collect())
        }
        TypedValue::AuthorizationRequest(request) => serde_json::to_value(request)?,
        TypedValue::Principal(principal) => serde_json::to_value(principal)?,
    })
}

// =============================================================================
// Typed Value Decoders
// =============================================================================

fn decode_instant(value: Value) -> Result<TypedValue, DecodeError> {
    let text = value
        .as_str()
        .ok_or_else(|| DecodeError::invalid(INSTANT_TAG, "expected an RFC 3339 string"))?;
    OffsetDateTime::parse(text, &Rfc3339)
        .map(TypedValue::Instant)
        .map_err(|e| DecodeError::invalid(INSTANT_TAG, e.to_string()))
}

fn decode_duration(value: Value) -> Result<TypedValue, DecodeError> {
    #[derive(serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct DurationPayload {
        seconds: i64,
        nanos: i32,
    }

    let payload: DurationPayload = serde_json::from_value(value)
        .map_err(|e| DecodeError::invalid(DURATION_TAG, e.to_string()))?;

    if payload.nanos.unsigned_abs() >= 1_000_000_000 {
        return Err(DecodeError::invalid(DURATION_TAG, "nanos out of range"));
    }
    if payload.seconds != 0 && payload.nanos != 0 && payload.seconds.signum() != i64::from(payload.nanos.signum())
    {
        return Err(DecodeError::invalid(
            DURATION_TAG,
            "seconds and nanos must share a sign",
        ));
    }

    Ok(TypedValue::Duration(Duration::new(
        payload.seconds,
        payload.nanos,
    )))
}

fn decode_url(value: Value) -> Result<TypedValue, DecodeError> {
    let text = value
        .as_str()
        .ok_or_else(|| DecodeError::invalid(URL_TAG, "expected a string"))?;
    Url::parse(text)
        .map(TypedValue::Url)
        .map_err(|e| DecodeError::invalid(URL_TAG, e.to_string()))
}

fn decode_string_set(value: Value) -> Result<TypedValue, DecodeError> {
    let items: Vec<String> = serde_json::from_value(value)
        .map_err(|e| DecodeError::invalid(SET_TAG, e.to_string()))?;
    Ok(TypedValue::StringSet(items.into_iter().collect::<BTreeSet<_>>()))
}

fn decode_authorization_request(value: Value) -> Result<TypedValue, DecodeError> {
    serde_json::from_value(value)
        .map(TypedValue::AuthorizationRequest)
        .map_err(|e| DecodeError::invalid(AUTHORIZATION_REQUEST_TAG, e.to_string()))
}

fn decode_principal(value: Value) -> Result<TypedValue, DecodeError> {
    serde_json::from_value(value)
        .map(TypedValue::Principal)
        .map_err(|e| DecodeError::invalid(PRINCIPAL_TAG, e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample_metadata() -> Metadata {
        let mut nested = Metadata::new();
        nested.insert("aud".to_string(), MetaValue::from("api"));
        nested.insert("n".to_string(), MetaValue::Integer(-7));

        let mut request = AuthorizationRequestSnapshot::new(
            "https://idp.example.com/oauth2/authorize",
            "code",
            "c1",
        );
        request.redirect_uri = Some("https://app.example.com/cb".to_string());
        request.scopes.insert("openid".to_string());
        request.state = Some("xyz".to_string());
        request
            .additional_parameters
            .insert("nonce".to_string(), "n-0S6_WzA2Mj".to_string());

        let mut principal = PrincipalSnapshot::authenticated("alice");
        principal.authorities.insert("ROLE_USER".to_string());

        let mut map = Metadata::new();
        map.insert("null".to_string(), MetaValue::Null);
        map.insert("flag".to_string(), MetaValue::Bool(true));
        map.insert("count".to_string(), MetaValue::Integer(42));
        map.insert("ratio".to_string(), MetaValue::Float(0.25));
        map.insert("whole".to_string(), MetaValue::Float(3.0));
        map.insert("name".to_string(), MetaValue::from("value"));
        map.insert(
            "list".to_string(),
            MetaValue::List(vec![MetaValue::from("a"), MetaValue::Integer(1)]),
        );
        map.insert("nested".to_string(), MetaValue::Map(nested));
        map.insert(
            "issued".to_string(),
            MetaValue::from(datetime!(2026-03-01 12:30:45.123456789 UTC)),
        );
        map.insert(
            "ttl".to_string(),
            MetaValue::Typed(TypedValue::Duration(Duration::new(300, 5))),
        );
        map.insert(
            "endpoint".to_string(),
            MetaValue::from(Url::parse("https://idp.example.com/cb?x=1").unwrap()),
        );
        map.insert(
            "scopes".to_string(),
            MetaValue::Typed(TypedValue::StringSet(
                ["read".to_string(), "write".to_string()].into_iter().collect(),
            )),
        );
        map.insert(
            "request".to_string(),
            MetaValue::Typed(TypedValue::AuthorizationRequest(request)),
        );
        map.insert(
            "principal".to_string(),
            MetaValue::Typed(TypedValue::Principal(principal)),
        );
        map
    }

    #[test]
    fn test_round_trip_all_supported_values() {
        let codec = TokenCodec::new();
        let original = sample_metadata();

        let encoded = codec.encode(&original).unwrap();
        let decoded = codec.decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_empty_map() {
        let codec = TokenCodec::new();
        assert_eq!(codec.encode(&Metadata::new()).unwrap(), "{}");
        assert!(codec.decode("{}").unwrap().is_empty());
    }

    #[test]
    fn test_disallowed_type_is_rejected() {
        let codec = TokenCodec::new();
        let payload = r#"{"evil":{"@type":"java.lang.ProcessBuilder","value":["rm","-rf","/"]}}"#;

        let err = codec.decode(payload).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::DisallowedType { ref tag } if tag == "java.lang.ProcessBuilder"
        ));
    }

    #[test]
    fn test_disallowed_type_nested_in_list_is_rejected() {
        let codec = TokenCodec::new();
        let payload = r#"{"items":[1,{"@type":"shell","value":"id"}]}"#;

        assert!(matches!(
            codec.decode(payload),
            Err(DecodeError::DisallowedType { .. })
        ));
    }

    #[test]
    fn test_non_string_tag_is_rejected() {
        let codec = TokenCodec::new();
        let payload = r#"{"x":{"@type":7,"value":1}}"#;
        assert!(matches!(
            codec.decode(payload),
            Err(DecodeError::MalformedEnvelope)
        ));
    }

    #[test]
    fn test_envelope_with_extra_keys_is_rejected() {
        let codec = TokenCodec::new();
        let payload = r#"{"x":{"@type":"instant","value":"2026-01-01T00:00:00Z","extra":1}}"#;
        assert!(matches!(
            codec.decode(payload),
            Err(DecodeError::MalformedEnvelope)
        ));
    }

    #[test]
    fn test_typed_payload_with_unknown_fields_is_rejected() {
        let codec = TokenCodec::new();
        let payload = r#"{"p":{"@type":"principal","value":{"name":"alice","class":"Exploit"}}}"#;
        assert!(matches!(
            codec.decode(payload),
            Err(DecodeError::InvalidTypedValue { ref tag, .. }) if tag == PRINCIPAL_TAG
        ));
    }

    #[test]
    fn test_user_map_with_reserved_key_round_trips() {
        let codec = TokenCodec::new();
        let mut inner = Metadata::new();
        inner.insert(TYPE_KEY.to_string(), MetaValue::from("instant"));
        inner.insert("other".to_string(), MetaValue::Integer(1));

        let mut map = Metadata::new();
        map.insert("claims".to_string(), MetaValue::Map(inner));

        let encoded = codec.encode(&map).unwrap();
        assert!(encoded.contains(r#""@type":"map""#));
        assert_eq!(codec.decode(&encoded).unwrap(), map);
    }

    #[test]
    fn test_root_with_reserved_key_round_trips() {
        let codec = TokenCodec::new();
        let mut map = Metadata::new();
        map.insert(TYPE_KEY.to_string(), MetaValue::from("principal"));

        let encoded = codec.encode(&map).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), map);
    }

    #[test]
    fn test_root_must_be_map() {
        let codec = TokenCodec::new();
        assert!(matches!(codec.decode("[1,2]"), Err(DecodeError::NotAMap)));
        assert!(matches!(
            codec.decode(r#"{"@type":"instant","value":"2026-01-01T00:00:00Z"}"#),
            Err(DecodeError::NotAMap)
        ));
    }

    #[test]
    fn test_malformed_json() {
        let codec = TokenCodec::new();
        assert!(matches!(
            codec.decode("{not json"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_finite_float_is_not_encoded() {
        let codec = TokenCodec::new();
        let mut map = Metadata::new();
        map.insert("nan".to_string(), MetaValue::Float(f64::NAN));
        assert!(matches!(
            codec.encode(&map),
            Err(EncodeError::NonFiniteFloat)
        ));
    }

    #[test]
    fn test_depth_limit() {
        let codec = TokenCodec::new().with_max_depth(3);

        let payload = r#"{"a":{"b":{"c":{"d":1}}}}"#;
        assert!(matches!(
            codec.decode(payload),
            Err(DecodeError::TooDeep { max: 3 })
        ));

        let mut level3 = Metadata::new();
        level3.insert("d".to_string(), MetaValue::Integer(1));
        let mut level2 = Metadata::new();
        level2.insert("c".to_string(), MetaValue::Map(level3));
        let mut level1 = Metadata::new();
        level1.insert("b".to_string(), MetaValue::Map(level2));
        let mut root = Metadata::new();
        root.insert("a".to_string(), MetaValue::Map(level1));
        assert!(matches!(
            codec.encode(&root),
            Err(EncodeError::TooDeep { max: 3 })
        ));
    }

    #[test]
    fn test_size_limit() {
        let codec = TokenCodec::new().with_max_payload_bytes(16);
        let payload = r#"{"key":"a long enough value"}"#;
        assert!(matches!(
            codec.decode(payload),
            Err(DecodeError::TooLarge { max: 16, .. })
        ));
    }

    #[test]
    fn test_invalid_instant() {
        let codec = TokenCodec::new();
        let payload = r#"{"t":{"@type":"instant","value":"yesterday"}}"#;
        assert!(matches!(
            codec.decode(payload),
            Err(DecodeError::InvalidTypedValue { ref tag, .. }) if tag == INSTANT_TAG
        ));
    }

    #[test]
    fn test_invalid_duration_sign() {
        let codec = TokenCodec::new();
        let payload = r#"{"d":{"@type":"duration","value":{"seconds":5,"nanos":-1}}}"#;
        assert!(matches!(
            codec.decode(payload),
            Err(DecodeError::InvalidTypedValue { ref tag, .. }) if tag == DURATION_TAG
        ));
    }

    #[test]
    fn test_huge_unsigned_number_is_out_of_range() {
        let codec = TokenCodec::new();
        let payload = r#"{"n":18446744073709551615}"#;
        assert!(matches!(
            codec.decode(payload),
            Err(DecodeError::NumberOutOfRange(_))
        ));
    }

    #[test]
    fn test_allowed_types_listing() {
        let tags: Vec<_> = TokenCodec::allowed_types().collect();
        assert_eq!(
            tags,
            vec![
                INSTANT_TAG,
                DURATION_TAG,
                URL_TAG,
                SET_TAG,
                AUTHORIZATION_REQUEST_TAG,
                PRINCIPAL_TAG,
                MAP_TAG
            ]
        );
    }
}
