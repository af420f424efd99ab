//! Domain types for grants, artifacts, registered clients and consents.

pub mod artifact;
pub mod client;
pub mod consent;
pub mod grant;
pub mod lifecycle;

pub use artifact::{
    AccessToken, AccessTokenType, CLAIMS_METADATA, INVALIDATED_METADATA, IdToken,
    REFRESHED_METADATA, TokenArtifact, has_storage_precision, truncate_to_micros,
};
pub use client::{
    AccessTokenFormat, ClientAuthMethod, ClientSettings, RegisteredClient, TokenSettings,
};
pub use consent::{ConsentRecord, SCOPE_AUTHORITY_PREFIX};
pub use grant::{AuthorizationGrant, GrantType, STATE_ATTRIBUTE, TokenKind, UnknownTokenKind};
pub use lifecycle::{CodeRedemption, GrantPhase};
