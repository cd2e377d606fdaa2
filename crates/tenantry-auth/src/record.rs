//! Flat persisted form of an authorization.
//!
//! One record per grant with a fixed group of columns per token kind. Map
//! fields hold codec output, scope sets are delimiter-joined and the grant
//! type is its protocol string.

use time::OffsetDateTime;

use crate::types::TokenKind;

/// Persisted columns of one token slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    /// Token value.
    pub value: String,
    /// Issue time.
    pub issued_at: Option<OffsetDateTime>,
    /// Expiry time.
    pub expires_at: Option<OffsetDateTime>,
    /// Codec-encoded metadata.
    pub metadata: Option<String>,
}

impl StoredToken {
    /// Returns `true` if the token expired at or before `as_of`.
    #[must_use]
    pub fn is_expired(&self, as_of: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|exp| exp <= as_of)
    }
}

/// Persisted authorization record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationRecord {
    pub id: String,
    pub registered_client_id: String,
    pub principal_name: String,
    pub authorization_grant_type: String,
    pub authorized_scopes: Option<String>,
    pub attributes: Option<String>,
    pub state: Option<String>,

    pub authorization_code: Option<StoredToken>,

    pub access_token: Option<StoredToken>,
    pub access_token_type: Option<String>,
    pub access_token_scopes: Option<String>,

    pub refresh_token: Option<StoredToken>,

    pub oidc_id_token: Option<StoredToken>,
    pub oidc_id_token_claims: Option<String>,

    pub user_code: Option<StoredToken>,
    pub device_code: Option<StoredToken>,
}

impl AuthorizationRecord {
    /// Returns the stored slot for a kind.
    #[must_use]
    pub fn slot(&self, kind: TokenKind) -> Option<&StoredToken> {
        match kind {
            TokenKind::AuthorizationCode => self.authorization_code.as_ref(),
            TokenKind::AccessToken => self.access_token.as_ref(),
            TokenKind::RefreshToken => self.refresh_token.as_ref(),
            TokenKind::IdToken => self.oidc_id_token.as_ref(),
            TokenKind::UserCode => self.user_code.as_ref(),
            TokenKind::DeviceCode => self.device_code.as_ref(),
        }
    }

    /// Returns the stored slot field for a kind mutably.
    pub fn slot_mut(&mut self, kind: TokenKind) -> &mut Option<StoredToken> {
        match kind {
            TokenKind::AuthorizationCode => &mut self.authorization_code,
            TokenKind::AccessToken => &mut self.access_token,
            TokenKind::RefreshToken => &mut self.refresh_token,
            TokenKind::IdToken => &mut self.oidc_id_token,
            TokenKind::UserCode => &mut self.user_code,
            TokenKind::DeviceCode => &mut self.device_code,
        }
    }

    /// Iterates populated slots in probe order.
    pub fn slots(&self) -> impl Iterator<Item = (TokenKind, &StoredToken)> {
        TokenKind::ALL
            .into_iter()
            .filter_map(|kind| self.slot(kind).map(|slot| (kind, slot)))
    }

    /// Returns `true` if any populated slot expired at or before `as_of`.
    #[must_use]
    pub fn has_expired_slot(&self, as_of: OffsetDateTime) -> bool {
        self.slots().any(|(_, slot)| slot.is_expired(as_of))
    }
}
