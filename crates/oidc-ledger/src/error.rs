//! Ledger error types.
//!
//! A missing grant, client or consent is never an error: lookups return
//! `Option::None`. Callers translate absence or an expired artifact into the
//! protocol-level `invalid_grant` / `invalid_token` responses themselves.

use std::fmt;

use crate::codec::{DecodeError, EncodeError};
use crate::config::ConfigError;

/// Errors that can occur while storing or materializing authorization state.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Stored metadata is malformed or names a type outside the allow-list.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Metadata cannot be represented in storable form.
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// A grant references a registered client that cannot be resolved.
    #[error("Registered client missing: {client_id}")]
    RegisteredClientMissing {
        /// The unresolved registered client id.
        client_id: String,
    },

    /// An artifact value is already owned by another grant.
    #[error("Duplicate token: {kind} value is already held by another grant")]
    DuplicateToken {
        /// The kind of the conflicting artifact.
        kind: String,
    },

    /// The grant failed validation before it was written.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The registered client failed validation before it was written.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The backing store could not be reached or failed the operation.
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Description of the infrastructure failure.
        message: String,
    },

    /// The ledger configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl From<ConfigError> for LedgerError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

impl LedgerError {
    /// Creates a new `RegisteredClientMissing` error.
    #[must_use]
    pub fn registered_client_missing(client_id: impl Into<String>) -> Self {
        Self::RegisteredClientMissing {
            client_id: client_id.into(),
        }
    }

    /// Creates a new `DuplicateToken` error.
    #[must_use]
    pub fn duplicate_token(kind: impl Into<String>) -> Self {
        Self::DuplicateToken { kind: kind.into() }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `StoreUnavailable` error.
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a decode error.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Returns `true` if the grant's registered client could not be resolved.
    #[must_use]
    pub fn is_registered_client_missing(&self) -> bool {
        matches!(self, Self::RegisteredClientMissing { .. })
    }

    /// Returns `true` if this is a token uniqueness violation.
    #[must_use]
    pub fn is_duplicate_token(&self) -> bool {
        matches!(self, Self::DuplicateToken { .. })
    }

    /// Returns `true` if the store failed and the operation may be retried.
    ///
    /// Callers must surface these (e.g. as a 5xx); the write did not happen.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Returns `true` if the error was caused by the data handed to the ledger.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Encode(_)
                | Self::DuplicateToken { .. }
                | Self::InvalidGrant { .. }
                | Self::InvalidClient { .. }
        )
    }

    /// Returns `true` if the error indicates a server-side failure.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Decode(_) | Self::Encode(_) => ErrorCategory::Codec,
            Self::RegisteredClientMissing { .. } => ErrorCategory::Consistency,
            Self::DuplicateToken { .. } => ErrorCategory::Consistency,
            Self::InvalidGrant { .. } | Self::InvalidClient { .. } => ErrorCategory::Validation,
            Self::StoreUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

/// Categories of ledger errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Metadata encoding or decoding failures.
    Codec,
    /// Stored state that violates a ledger invariant.
    Consistency,
    /// Input validation errors.
    Validation,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codec => write!(f, "codec"),
            Self::Consistency => write!(f, "consistency"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}
