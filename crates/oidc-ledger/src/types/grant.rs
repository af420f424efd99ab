//! Authorization grant domain types.
//!
//! An [`AuthorizationGrant`] is one authorization transaction. It owns up to
//! six independently expiring artifacts plus the `state` value from the
//! original request, all of which are globally unique lookup keys.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::artifact::{AccessToken, IdToken, TokenArtifact};
use crate::codec::{MetaValue, Metadata};
use crate::error::LedgerError;
use crate::LedgerResult;

/// Attribute key holding the `state` parameter of the authorization request.
pub const STATE_ATTRIBUTE: &str = "state";

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types.
///
/// Unknown values are carried through unchanged as [`GrantType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GrantType {
    /// Authorization Code flow.
    AuthorizationCode,
    /// Refresh Token flow.
    RefreshToken,
    /// Client Credentials flow.
    ClientCredentials,
    /// Device Authorization Grant (RFC 8628).
    DeviceCode,
    /// Any other grant type, stored verbatim.
    Custom(String),
}

impl GrantType {
    /// Device grant type URN from RFC 8628.
    pub const DEVICE_CODE_URN: &'static str = "urn:ietf:params:oauth:grant-type:device_code";

    /// Returns the OAuth 2.0 `grant_type` parameter value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::ClientCredentials => "client_credentials",
            Self::DeviceCode => Self::DEVICE_CODE_URN,
            Self::Custom(value) => value,
        }
    }
}

impl From<&str> for GrantType {
    fn from(value: &str) -> Self {
        match value {
            "authorization_code" => Self::AuthorizationCode,
            "refresh_token" => Self::RefreshToken,
            "client_credentials" => Self::ClientCredentials,
            Self::DEVICE_CODE_URN | "device_code" => Self::DeviceCode,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for GrantType {
    fn from(value: String) -> Self {
        match Self::from(value.as_str()) {
            Self::Custom(_) => Self::Custom(value),
            known => known,
        }
    }
}

impl From<GrantType> for String {
    fn from(value: GrantType) -> Self {
        match value {
            GrantType::Custom(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Token Kind
// =============================================================================

/// The kind of value a lookup key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    /// The `state` parameter of the authorization request.
    State,
    /// Authorization code.
    Code,
    /// Access token.
    AccessToken,
    /// Refresh token.
    RefreshToken,
    /// OpenID Connect ID token.
    IdToken,
    /// Device flow user code.
    UserCode,
    /// Device flow device code.
    DeviceCode,
}

impl TokenKind {
    /// The six artifact slots, excluding `state`.
    pub const ARTIFACTS: [TokenKind; 6] = [
        Self::Code,
        Self::AccessToken,
        Self::RefreshToken,
        Self::IdToken,
        Self::UserCode,
        Self::DeviceCode,
    ];

    /// Every kind, including `state`.
    pub const ALL: [TokenKind; 7] = [
        Self::State,
        Self::Code,
        Self::AccessToken,
        Self::RefreshToken,
        Self::IdToken,
        Self::UserCode,
        Self::DeviceCode,
    ];

    /// Returns the stored name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Code => "code",
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::IdToken => "id_token",
            Self::UserCode => "user_code",
            Self::DeviceCode => "device_code",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown token kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown token kind: {0}")]
pub struct UnknownTokenKind(pub String);

impl FromStr for TokenKind {
    type Err = UnknownTokenKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownTokenKind(s.to_string()))
    }
}

// =============================================================================
// Authorization Grant
// =============================================================================

/// One OAuth 2.0 / OpenID Connect authorization and its issued artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationGrant {
    /// Unique grant identifier.
    pub id: String,

    /// The owning registered client's `id` (not its public `client_id`).
    pub client_id: String,

    /// Name of the principal the grant was issued to.
    pub principal_name: String,

    /// Grant type that created the grant.
    pub grant_type: GrantType,

    /// Scopes the principal authorized.
    pub authorized_scopes: BTreeSet<String>,

    /// Opaque grant attributes, including the request `state`.
    pub attributes: Metadata,

    /// Authorization code.
    pub code: Option<TokenArtifact>,

    /// Access token.
    pub access_token: Option<AccessToken>,

    /// Refresh token.
    pub refresh_token: Option<TokenArtifact>,

    /// OpenID Connect ID token.
    pub id_token: Option<IdToken>,

    /// Device flow user code.
    pub user_code: Option<TokenArtifact>,

    /// Device flow device code.
    pub device_code: Option<TokenArtifact>,
}

impl AuthorizationGrant {
    /// Creates a grant without artifacts.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        principal_name: impl Into<String>,
        grant_type: GrantType,
    ) -> Self {
        Self {
            id: id.into(),
            client_id: client_id.into(),
            principal_name: principal_name.into(),
            grant_type,
            authorized_scopes: BTreeSet::new(),
            attributes: Metadata::new(),
            code: None,
            access_token: None,
            refresh_token: None,
            id_token: None,
            user_code: None,
            device_code: None,
        }
    }

    /// Sets the authorized scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorized_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Sets the request `state`.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.set_state(Some(state.into()));
        self
    }

    /// Sets the authorization code.
    #[must_use]
    pub fn with_code(mut self, code: TokenArtifact) -> Self {
        self.code = Some(code);
        self
    }

    /// Sets the access token.
    #[must_use]
    pub fn with_access_token(mut self, token: AccessToken) -> Self {
        self.access_token = Some(token);
        self
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: TokenArtifact) -> Self {
        self.refresh_token = Some(token);
        self
    }

    /// Sets the ID token.
    #[must_use]
    pub fn with_id_token(mut self, token: IdToken) -> Self {
        self.id_token = Some(token);
        self
    }

    /// Sets the device flow user code.
    #[must_use]
    pub fn with_user_code(mut self, code: TokenArtifact) -> Self {
        self.user_code = Some(code);
        self
    }

    /// Sets the device flow device code.
    #[must_use]
    pub fn with_device_code(mut self, code: TokenArtifact) -> Self {
        self.device_code = Some(code);
        self
    }

    /// Returns the request `state`, if one was stored.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.attributes.get(STATE_ATTRIBUTE).and_then(MetaValue::as_str)
    }

    /// Sets or clears the request `state`.
    pub fn set_state(&mut self, state: Option<String>) {
        match state {
            Some(state) => {
                self.attributes
                    .insert(STATE_ATTRIBUTE.to_string(), MetaValue::String(state));
            }
            None => {
                self.attributes.remove(STATE_ATTRIBUTE);
            }
        }
    }

    /// Returns the artifact held in the given slot.
    ///
    /// Always `None` for [`TokenKind::State`], which is an attribute.
    #[must_use]
    pub fn artifact(&self, kind: TokenKind) -> Option<&TokenArtifact> {
        match kind {
            TokenKind::State => None,
            TokenKind::Code => self.code.as_ref(),
            TokenKind::AccessToken => self.access_token.as_ref().map(|t| &t.artifact),
            TokenKind::RefreshToken => self.refresh_token.as_ref(),
            TokenKind::IdToken => self.id_token.as_ref().map(|t| &t.artifact),
            TokenKind::UserCode => self.user_code.as_ref(),
            TokenKind::DeviceCode => self.device_code.as_ref(),
        }
    }

    /// Returns the mutable artifact held in the given slot.
    pub fn artifact_mut(&mut self, kind: TokenKind) -> Option<&mut TokenArtifact> {
        match kind {
            TokenKind::State => None,
            TokenKind::Code => self.code.as_mut(),
            TokenKind::AccessToken => self.access_token.as_mut().map(|t| &mut t.artifact),
            TokenKind::RefreshToken => self.refresh_token.as_mut(),
            TokenKind::IdToken => self.id_token.as_mut().map(|t| &mut t.artifact),
            TokenKind::UserCode => self.user_code.as_mut(),
            TokenKind::DeviceCode => self.device_code.as_mut(),
        }
    }

    /// Empties the given slot. Clearing [`TokenKind::State`] drops the state attribute.
    pub fn clear(&mut self, kind: TokenKind) {
        match kind {
            TokenKind::State => self.set_state(None),
            TokenKind::Code => self.code = None,
            TokenKind::AccessToken => self.access_token = None,
            TokenKind::RefreshToken => self.refresh_token = None,
            TokenKind::IdToken => self.id_token = None,
            TokenKind::UserCode => self.user_code = None,
            TokenKind::DeviceCode => self.device_code = None,
        }
    }

    /// Returns every lookup key held by the grant, `state` included.
    #[must_use]
    pub fn lookup_keys(&self) -> Vec<(TokenKind, &str)> {
        let mut keys = Vec::with_capacity(TokenKind::ALL.len());
        if let Some(state) = self.state() {
            keys.push((TokenKind::State, state));
        }
        for kind in TokenKind::ARTIFACTS {
            if let Some(artifact) = self.artifact(kind) {
                keys.push((kind, artifact.value.as_str()));
            }
        }
        keys
    }

    /// Validates the grant before it is written.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidGrant` if:
    /// - An identifier is empty
    /// - A scope contains a comma or whitespace
    /// - An artifact has an empty value or expires before it was issued
    /// - An artifact instant carries sub-microsecond precision
    /// - Two slots hold the same value
    pub fn validate(&self) -> LedgerResult<()> {
        if self.id.is_empty() {
            return Err(LedgerError::invalid_grant("id cannot be empty"));
        }
        if self.client_id.is_empty() {
            return Err(LedgerError::invalid_grant("client_id cannot be empty"));
        }
        if self.principal_name.is_empty() {
            return Err(LedgerError::invalid_grant("principal_name cannot be empty"));
        }
        if self.grant_type.as_str().is_empty() {
            return Err(LedgerError::invalid_grant("grant_type cannot be empty"));
        }

        validate_scopes(&self.authorized_scopes)?;
        if let Some(access) = &self.access_token {
            validate_scopes(&access.scopes)?;
        }

        if let Some(value) = self.attributes.get(STATE_ATTRIBUTE)
            && value.as_str().is_none_or(str::is_empty)
        {
            return Err(LedgerError::invalid_grant(
                "state attribute must be a non-empty string",
            ));
        }

        for kind in TokenKind::ARTIFACTS {
            if let Some(artifact) = self.artifact(kind) {
                if artifact.value.is_empty() {
                    return Err(LedgerError::invalid_grant(format!(
                        "{kind} value cannot be empty"
                    )));
                }
                if artifact
                    .expires_at
                    .is_some_and(|expires_at| expires_at < artifact.issued_at)
                {
                    return Err(LedgerError::invalid_grant(format!(
                        "{kind} expires before it was issued"
                    )));
                }
                if !artifact.has_storage_precision() {
                    return Err(LedgerError::invalid_grant(format!(
                        "{kind} instants must have microsecond precision"
                    )));
                }
            }
        }

        let keys = self.lookup_keys();
        let mut seen = BTreeSet::new();
        for (kind, value) in &keys {
            if !seen.insert(*value) {
                return Err(LedgerError::invalid_grant(format!(
                    "{kind} value is already used by another slot of this grant"
                )));
            }
        }

        Ok(())
    }
}

fn validate_scopes(scopes: &BTreeSet<String>) -> LedgerResult<()> {
    for scope in scopes {
        if scope.is_empty() || scope.contains(',') || scope.chars().any(char::is_whitespace) {
            return Err(LedgerError::invalid_grant(format!(
                "invalid scope '{scope}'"
            )));
        }
    }
    Ok(())
}
