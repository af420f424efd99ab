//! Consent records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Prefix marking an authority as an OAuth scope.
pub const SCOPE_AUTHORITY_PREFIX: &str = "SCOPE_";

/// A principal's recorded approval of a client's scopes.
///
/// Keyed by (`client_id`, `principal_name`). `client_id` is the registered
/// client's `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// The registered client's `id`.
    pub client_id: String,

    /// The principal that gave consent.
    pub principal_name: String,

    /// Granted authorities. Scopes carry the `SCOPE_` prefix.
    pub authorities: BTreeSet<String>,
}

impl ConsentRecord {
    /// Creates an empty consent record.
    #[must_use]
    pub fn new(client_id: impl Into<String>, principal_name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            principal_name: principal_name.into(),
            authorities: BTreeSet::new(),
        }
    }

    /// Adds a scope, stored as a `SCOPE_` authority.
    #[must_use]
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.add_scope(scope);
        self
    }

    /// Adds a raw authority.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.insert(authority.into());
        self
    }

    /// Adds a scope, stored as a `SCOPE_` authority.
    pub fn add_scope(&mut self, scope: &str) {
        self.authorities
            .insert(format!("{SCOPE_AUTHORITY_PREFIX}{scope}"));
    }

    /// Returns the consented scopes without their prefix.
    #[must_use]
    pub fn scopes(&self) -> BTreeSet<&str> {
        self.authorities
            .iter()
            .filter_map(|authority| authority.strip_prefix(SCOPE_AUTHORITY_PREFIX))
            .collect()
    }

    /// Returns `true` if every requested scope was already consented to.
    #[must_use]
    pub fn covers<'a, I>(&self, requested: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let granted = self.scopes();
        requested.into_iter().all(|scope| granted.contains(scope))
    }
}
