//! Grant storage trait and the flattened grant row.
//!
//! Backends never see domain types. The ledger encodes an
//! [`AuthorizationGrant`](crate::types::AuthorizationGrant) into a
//! [`GrantRow`] whose metadata maps are already codec strings, and decodes
//! rows it reads back. A row maps one-to-one onto the `oauth2_authorization`
//! table.
//!
//! # Implementation Notes
//!
//! Implementations must:
//!
//! - Write the row and its token index atomically, so a reader never sees a
//!   half-written grant
//! - Keep every value from [`GrantRow::token_index`] unique across all grants
//!   and reject a conflicting write with `LedgerError::DuplicateToken`,
//!   leaving the store unchanged
//! - Replace the previous index entries of a grant on upsert
//! - Resolve a token lookup with at most one grant

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::LedgerResult;
use crate::types::TokenKind;

/// One stored artifact slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRow {
    /// Artifact value.
    pub value: String,

    /// Issue instant.
    pub issued_at: OffsetDateTime,

    /// Expiry instant.
    pub expires_at: Option<OffsetDateTime>,

    /// Encoded metadata map.
    pub metadata: Option<String>,
}

impl ArtifactRow {
    /// Returns `true` if the artifact expired before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

/// The persisted shape of a grant: one row, six artifact slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRow {
    /// Grant id (primary key).
    pub id: String,

    /// The registered client's `id`.
    pub client_id: String,

    /// Principal name.
    pub principal_name: String,

    /// Grant type name.
    pub grant_type: String,

    /// Comma-separated authorized scopes.
    pub scopes: String,

    /// Encoded attribute map.
    pub attributes: Option<String>,

    /// The request `state`, denormalized for lookup.
    pub state: Option<String>,

    /// Authorization code slot.
    pub code: Option<ArtifactRow>,

    /// Access token slot.
    pub access_token: Option<ArtifactRow>,

    /// Access token type.
    pub access_token_type: Option<String>,

    /// Comma-separated access token scopes.
    pub access_token_scopes: Option<String>,

    /// Refresh token slot.
    pub refresh_token: Option<ArtifactRow>,

    /// ID token slot.
    pub id_token: Option<ArtifactRow>,

    /// Encoded ID token claims.
    pub id_token_claims: Option<String>,

    /// User code slot.
    pub user_code: Option<ArtifactRow>,

    /// Device code slot.
    pub device_code: Option<ArtifactRow>,
}

impl GrantRow {
    /// Returns the artifact stored in the given slot.
    #[must_use]
    pub fn artifact(&self, kind: TokenKind) -> Option<&ArtifactRow> {
        match kind {
            TokenKind::State => None,
            TokenKind::Code => self.code.as_ref(),
            TokenKind::AccessToken => self.access_token.as_ref(),
            TokenKind::RefreshToken => self.refresh_token.as_ref(),
            TokenKind::IdToken => self.id_token.as_ref(),
            TokenKind::UserCode => self.user_code.as_ref(),
            TokenKind::DeviceCode => self.device_code.as_ref(),
        }
    }

    /// Returns the value held for the given kind, `state` included.
    #[must_use]
    pub fn value_of(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::State => self.state.as_deref(),
            other => self.artifact(other).map(|a| a.value.as_str()),
        }
    }

    /// Returns every indexed (kind, value) pair of this row.
    #[must_use]
    pub fn token_index(&self) -> Vec<(TokenKind, &str)> {
        TokenKind::ALL
            .into_iter()
            .filter_map(|kind| self.value_of(kind).map(|value| (kind, value)))
            .collect()
    }

    /// Returns `true` if the row holds at least one artifact and every
    /// populated artifact expired before `now`.
    ///
    /// Non-expiring artifacts keep a grant alive forever.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        let mut artifacts = TokenKind::ARTIFACTS
            .into_iter()
            .filter_map(|kind| self.artifact(kind))
            .peekable();
        artifacts.peek().is_some() && artifacts.all(|a| a.is_expired_at(now))
    }
}

/// Joins a set of strings into the comma-separated stored form.
#[must_use]
pub fn join_csv<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    values
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Splits a comma-separated stored value, skipping empty entries.
pub fn split_csv(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Storage trait for grant rows.
///
/// # Implementations
///
/// Implementations are provided for:
/// - In-memory (in `oidc-ledger-memory` crate)
/// - PostgreSQL (in `oidc-ledger-postgres` crate)
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Inserts the row, or replaces the row with the same id.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::DuplicateToken` if any indexed value belongs to
    /// another grant, and `LedgerError::StoreUnavailable` if the store fails.
    /// Nothing is written in either case.
    async fn upsert(&self, row: &GrantRow) -> LedgerResult<()>;

    /// Deletes the grant and all its indexed values.
    ///
    /// Returns `true` if a grant was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, id: &str) -> LedgerResult<bool>;

    /// Finds a grant row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: &str) -> LedgerResult<Option<GrantRow>>;

    /// Finds the grant owning `value` as one of the given kinds.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_token(
        &self,
        value: &str,
        kinds: &[TokenKind],
    ) -> LedgerResult<Option<GrantRow>>;

    /// Deletes every grant for which [`GrantRow::is_expired_at`] holds.
    ///
    /// Returns the number of deleted grants.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_expired(&self, now: OffsetDateTime) -> LedgerResult<u64>;
}
