//! Authorization record storage trait.
//!
//! This module defines the storage interface for flat authorization records.
//! Backings only persist and index [`AuthorizationRecord`]s; mapping to and
//! from [`Grant`](crate::types::Grant) and the multi-index lookup protocol
//! live in [`AuthorizationStore`](crate::store::AuthorizationStore).
//!
//! # Implementation Notes
//!
//! Implementations should:
//!
//! - Replace the whole record on upsert, never patch individual columns
//! - Keep one unique index per token kind and report collisions with a
//!   *different* record as [`AuthError::Conflict`](crate::AuthError::Conflict)
//! - Treat deleting a missing id as a no-op
//!
//! # Security Considerations
//!
//! - Never log token values; use [`redact_token`](crate::error::redact_token)
//! - Token values are bearer credentials and should be stored encrypted at
//!   rest where the backend supports it

use std::fmt;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::record::AuthorizationRecord;
use crate::types::TokenKind;

// =============================================================================
// Token Index
// =============================================================================

/// An index a token value can be looked up in.
///
/// `State` indexes the OAuth 2.0 `state` parameter; the others index the
/// value column of one token slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenIndex {
    /// The `state` request parameter.
    State,
    /// A token slot.
    Token(TokenKind),
}

impl TokenIndex {
    /// Probe order for lookups without a hint.
    ///
    /// Short-lived state and code values are checked first since they are
    /// looked up within the flow that minted them; steady-state bearer and
    /// refresh traffic follows.
    pub const PROBE_ORDER: [TokenIndex; 7] = [
        Self::State,
        Self::Token(TokenKind::AuthorizationCode),
        Self::Token(TokenKind::AccessToken),
        Self::Token(TokenKind::RefreshToken),
        Self::Token(TokenKind::IdToken),
        Self::Token(TokenKind::UserCode),
        Self::Token(TokenKind::DeviceCode),
    ];

    /// Parses an RFC 7009 / RFC 7662 `token_type_hint`.
    ///
    /// Accepts `state` and every token kind name. Unknown hints yield `None`
    /// so callers fall back to the full probe, as RFC 7009 requires.
    #[must_use]
    pub fn from_token_type_hint(hint: &str) -> Option<Self> {
        match hint {
            "state" => Some(Self::State),
            other => TokenKind::parse(other).map(Self::Token),
        }
    }

    /// Returns the index name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Token(kind) => kind.as_str(),
        }
    }
}

impl From<TokenKind> for TokenIndex {
    fn from(kind: TokenKind) -> Self {
        Self::Token(kind)
    }
}

impl fmt::Display for TokenIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Storage Trait
// =============================================================================

/// Storage trait for authorization records.
///
/// # Implementations
///
/// Implementations are provided for:
/// - In-memory (`InMemoryAuthorizationStorage` in this crate)
/// - PostgreSQL (in the `tenantry-auth-postgres` crate)
#[async_trait]
pub trait AuthorizationRecordStorage: Send + Sync {
    /// Inserts or fully replaces the record with `record.id`.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if a token value is already indexed under another
    /// record, or a storage error. Nothing is written on failure.
    async fn upsert(&self, record: &AuthorizationRecord) -> AuthResult<()>;

    /// Deletes a record. Deleting a missing id succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, id: &str) -> AuthResult<()>;

    /// Deletes every record of a registered client.
    ///
    /// Used when a client registration is removed, which would otherwise
    /// leave orphaned records behind.
    ///
    /// # Returns
    ///
    /// Returns the number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_by_client(&self, registered_client_id: &str) -> AuthResult<u64>;

    /// Finds a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: &str) -> AuthResult<Option<AuthorizationRecord>>;

    /// Finds the record whose `index` column equals `value`.
    ///
    /// Only the given index is consulted. The `state` index is not unique;
    /// when several records share a state any one of them may be returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_index(
        &self,
        index: TokenIndex,
        value: &str,
    ) -> AuthResult<Option<AuthorizationRecord>>;

    /// Finds records whose `kind` slot is populated and expired at or before
    /// `as_of`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_expired(
        &self,
        kind: TokenKind,
        as_of: OffsetDateTime,
    ) -> AuthResult<Vec<AuthorizationRecord>>;

    /// Deletes every record with at least one populated slot expired at or
    /// before `as_of`.
    ///
    /// # Returns
    ///
    /// Returns the number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_expired(&self, as_of: OffsetDateTime) -> AuthResult<u64>;
}
