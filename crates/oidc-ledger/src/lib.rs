//! # oidc-ledger
//!
//! Persistence and lookup layer for OAuth 2.0 / OpenID Connect authorization
//! state.
//!
//! This crate provides:
//! - The [`AuthorizationLedger`], which stores one grant per authorization
//!   transaction together with its code, access, refresh, ID, user and device
//!   artifacts
//! - The [`TokenCodec`], an allow-list codec for artifact metadata and grant
//!   attributes
//! - The registered client directory trait and a cached wrapper
//! - The [`ConsentLedger`] for per client/principal consent decisions
//!
//! ## Modules
//!
//! - [`codec`] - Metadata values and the allow-listed codec
//! - [`config`] - Ledger configuration
//! - [`types`] - Grants, artifacts, registered clients and consents
//! - [`storage`] - Storage traits implemented by backend crates
//! - [`ledger`] - Ledger services composing storage, codec and client directory
//! - [`cache`] - Cached registered client directory
//! - [`pruner`] - Optional background removal of fully expired grants
//!
//! ## Backends
//!
//! Storage implementations are provided in separate crates:
//!
//! - `oidc-ledger-memory` - in-process storage
//! - `oidc-ledger-postgres` - PostgreSQL storage

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pruner;
pub mod storage;
pub mod types;

pub use cache::{CacheStats, CachedClientDirectory};
pub use codec::{DecodeError, EncodeError, MetaValue, Metadata, TokenCodec, TypedValue};
pub use config::{ConfigError, LedgerConfig};
pub use error::{ErrorCategory, LedgerError};
pub use ledger::{AuthorizationLedger, ConsentLedger};
pub use pruner::{spawn_configured_pruner, spawn_pruner};
pub use storage::{ArtifactRow, ClientDirectory, ConsentStore, GrantRow, GrantStore};
pub use types::{
    AccessToken, AccessTokenFormat, AccessTokenType, AuthorizationGrant, ClientAuthMethod, ClientSettings,
    CodeRedemption, ConsentRecord, GrantPhase, GrantType, IdToken, RegisteredClient, TokenArtifact,
    TokenKind, TokenSettings,
};

/// Type alias for ledger results.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use oidc_ledger::prelude::*;
/// ```
pub mod prelude {
    pub use crate::LedgerResult;
    pub use crate::cache::CachedClientDirectory;
    pub use crate::codec::{MetaValue, Metadata, TokenCodec, TypedValue};
    pub use crate::config::LedgerConfig;
    pub use crate::error::LedgerError;
    pub use crate::ledger::{AuthorizationLedger, ConsentLedger};
    pub use crate::storage::{ClientDirectory, ConsentStore, GrantStore};
    pub use crate::types::{
        AccessToken, AuthorizationGrant, ConsentRecord, GrantType, IdToken, RegisteredClient,
        TokenArtifact, TokenKind,
    };
}
