//! Token artifacts.
//!
//! Every artifact carries its own issue and expiry instants and an opaque
//! metadata map. Expired or invalidated artifacts are still returned by
//! lookups; deciding what to do with them is the caller's job.

use std::collections::BTreeSet;
use std::fmt;

use time::OffsetDateTime;

use crate::codec::{MetaValue, Metadata};

/// Metadata key marking an artifact as consumed or revoked.
pub const INVALIDATED_METADATA: &str = "metadata.token.invalidated";

/// Metadata key holding the claims of a self-contained token.
pub const CLAIMS_METADATA: &str = "metadata.token.claims";

/// Metadata key marking an access token issued by a refresh.
pub const REFRESHED_METADATA: &str = "metadata.token.refreshed";

/// Drops the sub-microsecond part of an instant.
///
/// Stored instants are kept at microsecond precision, so artifacts built
/// through the constructors compare equal after a store round trip.
#[must_use]
pub fn truncate_to_micros(instant: OffsetDateTime) -> OffsetDateTime {
    instant - time::Duration::nanoseconds(i64::from(instant.nanosecond() % 1_000))
}

/// Returns `true` if the instant carries no sub-microsecond part.
#[must_use]
pub fn has_storage_precision(instant: OffsetDateTime) -> bool {
    instant.nanosecond() % 1_000 == 0
}

/// A single issued token or code value.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenArtifact {
    /// Opaque value, unique across every artifact of every grant.
    pub value: String,

    /// When the artifact was issued.
    pub issued_at: OffsetDateTime,

    /// When the artifact expires. `None` never expires.
    pub expires_at: Option<OffsetDateTime>,

    /// Provider-specific metadata.
    pub metadata: Metadata,
}

impl TokenArtifact {
    /// Creates a non-expiring artifact.
    #[must_use]
    pub fn new(value: impl Into<String>, issued_at: OffsetDateTime) -> Self {
        Self {
            value: value.into(),
            issued_at: truncate_to_micros(issued_at),
            expires_at: None,
            metadata: Metadata::new(),
        }
    }

    /// Sets the expiry instant.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(truncate_to_micros(expires_at));
        self
    }

    /// Sets the expiry relative to the issue instant.
    #[must_use]
    pub fn with_ttl(mut self, ttl: time::Duration) -> Self {
        self.expires_at = Some(truncate_to_micros(self.issued_at + ttl));
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the token claims metadata.
    #[must_use]
    pub fn with_claims(mut self, claims: Metadata) -> Self {
        self.metadata
            .insert(CLAIMS_METADATA.to_string(), MetaValue::Map(claims));
        self
    }

    /// Returns the token claims, if present.
    #[must_use]
    pub fn claims(&self) -> Option<&Metadata> {
        self.metadata.get(CLAIMS_METADATA).and_then(MetaValue::as_map)
    }

    /// Returns `true` if the artifact has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Returns `true` if the artifact was consumed or revoked.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.metadata
            .get(INVALIDATED_METADATA)
            .and_then(MetaValue::as_bool)
            .unwrap_or(false)
    }

    /// Marks the artifact as consumed or revoked.
    pub fn invalidate(&mut self) {
        self.metadata
            .insert(INVALIDATED_METADATA.to_string(), MetaValue::Bool(true));
    }

    /// Returns `true` if the artifact is neither expired nor invalidated.
    #[must_use]
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        !self.is_invalidated() && !self.is_expired_at(now)
    }

    /// Returns `true` if both instants fit microsecond storage.
    #[must_use]
    pub fn has_storage_precision(&self) -> bool {
        has_storage_precision(self.issued_at) && self.expires_at.is_none_or(has_storage_precision)
    }
}

// =============================================================================
// Access Token
// =============================================================================

/// Access token type as reported in the token response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessTokenType {
    /// RFC 6750 bearer token.
    Bearer,
    /// RFC 9449 sender-constrained token.
    DPoP,
    /// Any other token type, stored verbatim.
    Custom(String),
}

impl AccessTokenType {
    /// Returns the stored token type name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bearer => "Bearer",
            Self::DPoP => "DPoP",
            Self::Custom(value) => value,
        }
    }

    /// Parses a token type. Known types are matched case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("bearer") {
            Self::Bearer
        } else if value.eq_ignore_ascii_case("dpop") {
            Self::DPoP
        } else {
            Self::Custom(value.to_string())
        }
    }
}

impl fmt::Display for AccessTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An access token artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    /// The underlying artifact.
    pub artifact: TokenArtifact,

    /// Token type.
    pub token_type: AccessTokenType,

    /// Scopes granted to this token, a subset of the grant's scopes.
    pub scopes: BTreeSet<String>,
}

impl AccessToken {
    /// Creates an access token without scopes.
    #[must_use]
    pub fn new(artifact: TokenArtifact, token_type: AccessTokenType) -> Self {
        Self {
            artifact,
            token_type,
            scopes: BTreeSet::new(),
        }
    }

    /// Creates a bearer access token.
    #[must_use]
    pub fn bearer(artifact: TokenArtifact) -> Self {
        Self::new(artifact, AccessTokenType::Bearer)
    }

    /// Sets the token scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the token value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.artifact.value
    }

    /// Returns `true` if this token was issued by a refresh.
    #[must_use]
    pub fn is_refreshed(&self) -> bool {
        self.artifact
            .metadata
            .get(REFRESHED_METADATA)
            .and_then(MetaValue::as_bool)
            .unwrap_or(false)
    }
}

// =============================================================================
// ID Token
// =============================================================================

/// An OpenID Connect ID token artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct IdToken {
    /// The underlying artifact (the encoded JWT).
    pub artifact: TokenArtifact,

    /// Decoded claims.
    pub claims: Metadata,
}

impl IdToken {
    /// Creates an ID token.
    #[must_use]
    pub fn new(artifact: TokenArtifact, claims: Metadata) -> Self {
        Self { artifact, claims }
    }

    /// Returns the token value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.artifact.value
    }

    /// Returns the `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(MetaValue::as_str)
    }
}
