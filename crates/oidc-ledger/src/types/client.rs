//! Registered client domain types.
//!
//! A [`RegisteredClient`] is the static context a grant is materialized
//! against: its allowed grant types, redirect URIs, scopes and the settings
//! that govern token lifetimes and refresh token reuse.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::artifact::{has_storage_precision, truncate_to_micros};
use super::grant::GrantType;
use crate::error::LedgerError;
use crate::LedgerResult;

// =============================================================================
// Client Authentication Method
// =============================================================================

/// Token endpoint client authentication methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClientAuthMethod {
    /// HTTP Basic authentication with the client secret.
    ClientSecretBasic,
    /// Client secret in the request body.
    ClientSecretPost,
    /// JWT signed with the client secret.
    ClientSecretJwt,
    /// JWT signed with the client's private key.
    PrivateKeyJwt,
    /// Public client, no authentication.
    None,
    /// Any other method, stored verbatim.
    Custom(String),
}

impl ClientAuthMethod {
    /// Returns the registered method name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::ClientSecretJwt => "client_secret_jwt",
            Self::PrivateKeyJwt => "private_key_jwt",
            Self::None => "none",
            Self::Custom(value) => value,
        }
    }
}

impl From<String> for ClientAuthMethod {
    fn from(value: String) -> Self {
        match value.as_str() {
            "client_secret_basic" => Self::ClientSecretBasic,
            "client_secret_post" => Self::ClientSecretPost,
            "client_secret_jwt" => Self::ClientSecretJwt,
            "private_key_jwt" => Self::PrivateKeyJwt,
            "none" => Self::None,
            _ => Self::Custom(value),
        }
    }
}

impl From<ClientAuthMethod> for String {
    fn from(value: ClientAuthMethod) -> Self {
        match value {
            ClientAuthMethod::Custom(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ClientAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Per-client behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Require PKCE for the authorization code flow.
    pub require_proof_key: bool,

    /// Show the consent screen even for previously approved scopes.
    pub require_authorization_consent: bool,

    /// Where the client publishes its public keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk_set_url: Option<String>,
}

/// Format of issued access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTokenFormat {
    /// Signed JWT.
    #[default]
    SelfContained,
    /// Opaque value resolved through introspection.
    Reference,
}

/// Per-client token lifetimes and refresh behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Authorization code lifetime.
    #[serde(with = "humantime_serde")]
    pub authorization_code_ttl: Duration,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_ttl: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_ttl: Duration,

    /// Device code lifetime.
    #[serde(with = "humantime_serde")]
    pub device_code_ttl: Duration,

    /// ID token lifetime.
    #[serde(with = "humantime_serde")]
    pub id_token_ttl: Duration,

    /// Keep the refresh token on refresh instead of rotating it.
    pub reuse_refresh_tokens: bool,

    /// Access token format.
    pub access_token_format: AccessTokenFormat,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            authorization_code_ttl: Duration::from_secs(5 * 60),
            access_token_ttl: Duration::from_secs(5 * 60),
            refresh_token_ttl: Duration::from_secs(60 * 60),
            device_code_ttl: Duration::from_secs(5 * 60),
            id_token_ttl: Duration::from_secs(30 * 60),
            reuse_refresh_tokens: true,
            access_token_format: AccessTokenFormat::SelfContained,
        }
    }
}

impl TokenSettings {
    /// Returns `issued_at + ttl`, saturating at the maximum representable instant.
    #[must_use]
    pub fn expires_at(issued_at: OffsetDateTime, ttl: Duration) -> OffsetDateTime {
        issued_at
            .checked_add(time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX))
            .unwrap_or(time::PrimitiveDateTime::MAX.assume_utc())
    }

    fn ttls(&self) -> [(&'static str, Duration); 5] {
        [
            ("authorization_code_ttl", self.authorization_code_ttl),
            ("access_token_ttl", self.access_token_ttl),
            ("refresh_token_ttl", self.refresh_token_ttl),
            ("device_code_ttl", self.device_code_ttl),
            ("id_token_ttl", self.id_token_ttl),
        ]
    }
}

// =============================================================================
// Registered Client
// =============================================================================

/// An OAuth 2.0 client registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClient {
    /// Internal identifier referenced by grants.
    pub id: String,

    /// Public client identifier used in OAuth flows.
    pub client_id: String,

    /// When the client identifier was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub client_id_issued_at: OffsetDateTime,

    /// Hashed client secret. `None` for public clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// When the client secret expires.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub client_secret_expires_at: Option<OffsetDateTime>,

    /// Human-readable name.
    pub client_name: String,

    /// Allowed token endpoint authentication methods.
    #[serde(default)]
    pub authentication_methods: BTreeSet<ClientAuthMethod>,

    /// Allowed grant types.
    pub grant_types: BTreeSet<GrantType>,

    /// Allowed redirect URIs.
    #[serde(default)]
    pub redirect_uris: BTreeSet<String>,

    /// Allowed post-logout redirect URIs.
    #[serde(default)]
    pub post_logout_redirect_uris: BTreeSet<String>,

    /// Scopes the client may request.
    #[serde(default)]
    pub scopes: BTreeSet<String>,

    /// Client behaviour settings.
    #[serde(default)]
    pub client_settings: ClientSettings,

    /// Token lifetimes and refresh behaviour.
    #[serde(default)]
    pub token_settings: TokenSettings,
}

impl RegisteredClient {
    /// Creates a client with default settings.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        client_id_issued_at: OffsetDateTime,
    ) -> Self {
        let client_id = client_id.into();
        Self {
            id: id.into(),
            client_name: client_id.clone(),
            client_id,
            client_id_issued_at: truncate_to_micros(client_id_issued_at),
            client_secret: None,
            client_secret_expires_at: None,
            authentication_methods: BTreeSet::new(),
            grant_types: BTreeSet::new(),
            redirect_uris: BTreeSet::new(),
            post_logout_redirect_uris: BTreeSet::new(),
            scopes: BTreeSet::new(),
            client_settings: ClientSettings::default(),
            token_settings: TokenSettings::default(),
        }
    }

    /// Sets the client name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets when the client secret expires.
    #[must_use]
    pub fn with_secret_expires_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.client_secret_expires_at = Some(truncate_to_micros(expires_at));
        self
    }

    /// Adds an authentication method.
    #[must_use]
    pub fn with_authentication_method(mut self, method: ClientAuthMethod) -> Self {
        self.authentication_methods.insert(method);
        self
    }

    /// Adds a grant type.
    #[must_use]
    pub fn with_grant_type(mut self, grant_type: GrantType) -> Self {
        self.grant_types.insert(grant_type);
        self
    }

    /// Adds a redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.insert(uri.into());
        self
    }

    /// Adds a scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    /// Sets the client settings.
    #[must_use]
    pub fn with_client_settings(mut self, settings: ClientSettings) -> Self {
        self.client_settings = settings;
        self
    }

    /// Sets the token settings.
    #[must_use]
    pub fn with_token_settings(mut self, settings: TokenSettings) -> Self {
        self.token_settings = settings;
        self
    }

    /// Returns `true` if the client has no secret.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.client_secret.is_none()
    }

    /// Returns `true` if the client may use the given grant type.
    #[must_use]
    pub fn allows_grant_type(&self, grant_type: &GrantType) -> bool {
        self.grant_types.contains(grant_type)
    }

    /// Checks if the given redirect URI is registered (exact match).
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.contains(uri)
    }

    /// Checks if the given scope may be requested. An empty scope set allows all.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.scopes.is_empty() || self.scopes.contains(scope)
    }

    /// Validates the client registration.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidClient` if:
    /// - `id` or `client_id` is empty
    /// - No grant types are registered
    /// - `authorization_code` is allowed without redirect URIs
    /// - A public client is allowed `client_credentials`
    /// - A token lifetime is zero
    /// - An instant carries sub-microsecond precision
    pub fn validate(&self) -> LedgerResult<()> {
        if self.id.is_empty() {
            return Err(LedgerError::invalid_client("id cannot be empty"));
        }

        if self.client_id.is_empty() {
            return Err(LedgerError::invalid_client("client_id cannot be empty"));
        }

        if self.grant_types.is_empty() {
            return Err(LedgerError::invalid_client(
                "at least one grant type is required",
            ));
        }

        if self.grant_types.contains(&GrantType::AuthorizationCode) && self.redirect_uris.is_empty()
        {
            return Err(LedgerError::invalid_client(
                "authorization_code requires at least one redirect URI",
            ));
        }

        if self.is_public() && self.grant_types.contains(&GrantType::ClientCredentials) {
            return Err(LedgerError::invalid_client(
                "public clients cannot use client_credentials",
            ));
        }

        for (name, ttl) in self.token_settings.ttls() {
            if ttl.is_zero() {
                return Err(LedgerError::invalid_client(format!("{name} must be > 0")));
            }
        }

        if !has_storage_precision(self.client_id_issued_at)
            || !self.client_secret_expires_at.is_none_or(has_storage_precision)
        {
            return Err(LedgerError::invalid_client(
                "client instants must have microsecond precision",
            ));
        }

        Ok(())
    }
}
