//! Storage traits for the ledger.
//!
//! Backends implement these traits; the ledger services in
//! [`crate::ledger`] compose them with the codec and the client directory.
//!
//! # Traits
//!
//! - [`GrantStore`] - Flattened grant rows and their token index
//! - [`ClientDirectory`] - Registered clients
//! - [`ConsentStore`] - Consent records
//!
//! # Implementations
//!
//! - `oidc-ledger-memory` - in-process maps
//! - `oidc-ledger-postgres` - PostgreSQL tables

mod client;
mod consent;
mod grant;

pub use client::ClientDirectory;
pub use consent::ConsentStore;
pub use grant::{ArtifactRow, GrantRow, GrantStore, join_csv, split_csv};
