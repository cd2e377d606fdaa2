//! Authorization store error types.
//!
//! A lookup miss is not an error: finders return `Ok(None)` and callers map
//! that to an `invalid_token` response. Everything in [`AuthError`] needs
//! caller or operator attention.

use std::fmt;

use crate::storage::TokenIndex;
use crate::types::TokenKind;

/// Number of leading characters of a token value that may appear in errors and logs.
pub const TOKEN_PREFIX_LEN: usize = 8;

/// Errors that can occur while storing, mapping or looking up authorizations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// An attribute, metadata or claims map could not be encoded or decoded.
    #[error("Codec error: {message}")]
    Codec {
        /// Description of the offending value.
        message: String,
    },

    /// The registered client referenced by a stored record no longer exists.
    #[error("Registered client '{client_id}' not found for authorization '{grant_id}'")]
    ClientNotFound {
        /// The unresolved registered client id.
        client_id: String,
        /// The authorization that references it.
        grant_id: String,
    },

    /// A token value is already indexed under a different authorization.
    #[error("Conflict: {kind} '{value_prefix}' already belongs to another authorization (saving '{grant_id}')")]
    Conflict {
        /// The authorization being saved.
        grant_id: String,
        /// The slot whose value collided.
        kind: TokenKind,
        /// Redacted prefix of the colliding value.
        value_prefix: String,
    },

    /// A stored record is structurally unusable.
    #[error("Invalid authorization record '{grant_id}': {message}")]
    InvalidRecord {
        /// The record id.
        grant_id: String,
        /// Description of the defect.
        message: String,
    },

    /// The storage backend failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Codec` error.
    #[must_use]
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a new `ClientNotFound` error.
    #[must_use]
    pub fn client_not_found(client_id: impl Into<String>, grant_id: impl Into<String>) -> Self {
        Self::ClientNotFound {
            client_id: client_id.into(),
            grant_id: grant_id.into(),
        }
    }

    /// Creates a new `Conflict` error. The token value is redacted here.
    #[must_use]
    pub fn conflict(grant_id: impl Into<String>, kind: TokenKind, value: &str) -> Self {
        Self::Conflict {
            grant_id: grant_id.into(),
            kind,
            value_prefix: redact_token(value),
        }
    }

    /// Creates a new `InvalidRecord` error.
    #[must_use]
    pub fn invalid_record(grant_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            grant_id: grant_id.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Prefixes the message of codec and storage errors with the grant and slot
    /// being processed. Other variants already carry their context.
    #[must_use]
    pub fn with_context(self, grant_id: &str, kind: Option<TokenKind>) -> Self {
        match kind {
            Some(kind) => self.within(format!("authorization '{grant_id}' ({kind})")),
            None => self.within(format!("authorization '{grant_id}'")),
        }
    }

    /// Prefixes the message of codec and storage errors with the index consulted
    /// and a redacted prefix of the looked-up value.
    #[must_use]
    pub fn with_lookup_context(self, index: TokenIndex, value: &str) -> Self {
        self.within(format!("{index} lookup '{}'", redact_token(value)))
    }

    /// Prefixes the message of codec and storage errors with `scope`.
    #[must_use]
    pub fn within(self, scope: impl fmt::Display) -> Self {
        match self {
            Self::Codec { message } => Self::Codec {
                message: format!("{scope}: {message}"),
            },
            Self::Storage { message } => Self::Storage {
                message: format!("{scope}: {message}"),
            },
            other => other,
        }
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if this is a `ClientNotFound` error.
    #[must_use]
    pub fn is_client_not_found(&self) -> bool {
        matches!(self, Self::ClientNotFound { .. })
    }

    /// Returns `true` if this is a `Codec` error.
    #[must_use]
    pub fn is_codec_error(&self) -> bool {
        matches!(self, Self::Codec { .. })
    }

    /// Returns `true` if the failure originates in infrastructure rather than data.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Internal { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Codec { .. } | Self::InvalidRecord { .. } => ErrorCategory::Data,
            Self::ClientNotFound { .. } => ErrorCategory::Orphaned,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of store errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Stored or supplied data could not be converted.
    Data,
    /// A record references a client that no longer exists.
    Orphaned,
    /// Token value uniqueness violation.
    Conflict,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => write!(f, "data"),
            Self::Orphaned => write!(f, "orphaned"),
            Self::Conflict => write!(f, "conflict"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Reduces a token value to a loggable prefix.
///
/// At most [`TOKEN_PREFIX_LEN`] characters and never more than half of the
/// value are kept, so short user codes stay unguessable.
#[must_use]
pub fn redact_token(value: &str) -> String {
    let keep = TOKEN_PREFIX_LEN.min(value.chars().count() / 2);
    let prefix: String = value.chars().take(keep).collect();
    format!("{prefix}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::client_not_found("app-1", "grant-1");
        assert_eq!(
            err.to_string(),
            "Registered client 'app-1' not found for authorization 'grant-1'"
        );

        let err = AuthError::codec("unsupported value");
        assert_eq!(err.to_string(), "Codec error: unsupported value");
    }

    #[test]
    fn test_conflict_never_carries_full_token() {
        let token = "eyJhbGciOiJSUzI1NiJ9.secret-payload";
        let err = AuthError::conflict("grant-1", TokenKind::AccessToken, token);
        let message = err.to_string();
        assert!(message.contains("eyJhbGci…"));
        assert!(!message.contains("secret-payload"));
        assert!(err.is_conflict());
    }

    #[test]
    fn test_redact_short_values() {
        assert_eq!(redact_token("WDJB-MJHT"), "WDJB…");
        assert_eq!(redact_token("abc"), "a…");
        assert_eq!(redact_token(""), "…");
    }

    #[test]
    fn test_with_context() {
        let err = AuthError::codec("NaN is not storable")
            .with_context("grant-9", Some(TokenKind::IdToken));
        assert_eq!(
            err.to_string(),
            "Codec error: authorization 'grant-9' (id_token): NaN is not storable"
        );

        let err = AuthError::client_not_found("c", "g").with_context("other", None);
        assert!(err.is_client_not_found());
    }

    #[test]
    fn test_with_lookup_context_redacts_value() {
        let err = AuthError::storage("connection reset").with_lookup_context(
            TokenIndex::Token(TokenKind::RefreshToken),
            "rt-abcdef123456-secret",
        );
        let message = err.to_string();
        assert!(message.contains("refresh_token lookup 'rt-abcde…'"), "{message}");
        assert!(!message.contains("secret"));
        assert!(err.is_server_error());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(AuthError::codec("x").category(), ErrorCategory::Data);
        assert_eq!(
            AuthError::client_not_found("c", "g").category(),
            ErrorCategory::Orphaned
        );
        assert_eq!(
            AuthError::storage("down").category(),
            ErrorCategory::Infrastructure
        );
        assert!(AuthError::storage("down").is_server_error());
        assert!(!AuthError::codec("x").is_server_error());
        assert_eq!(ErrorCategory::Orphaned.to_string(), "orphaned");
    }
}
