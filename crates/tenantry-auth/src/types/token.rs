//! Token slots carried by an authorization.

use std::collections::BTreeSet;
use std::fmt;

use time::OffsetDateTime;

use crate::codec::{AttributeValue, Attributes};

/// Metadata key marking a token as invalidated (revoked or superseded).
pub const INVALIDATED_METADATA_KEY: &str = "metadata.token.invalidated";

// =============================================================================
// Token Kind
// =============================================================================

/// The six token slots an authorization may carry.
///
/// The declaration order is the lookup probe order (after `state`), so
/// `Ord` on this type yields that order as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    /// OAuth 2.0 authorization code.
    AuthorizationCode,
    /// OAuth 2.0 access token.
    AccessToken,
    /// OAuth 2.0 refresh token.
    RefreshToken,
    /// OpenID Connect ID token.
    IdToken,
    /// Device flow user code.
    UserCode,
    /// Device flow device code.
    DeviceCode,
}

impl TokenKind {
    /// All kinds in probe order.
    pub const ALL: [TokenKind; 6] = [
        Self::AuthorizationCode,
        Self::AccessToken,
        Self::RefreshToken,
        Self::IdToken,
        Self::UserCode,
        Self::DeviceCode,
    ];

    /// Returns the canonical token type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::IdToken => "id_token",
            Self::UserCode => "user_code",
            Self::DeviceCode => "device_code",
        }
    }

    /// Parses a canonical token type name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Access Token Type
// =============================================================================

/// Access token subtype (`token_type` in token responses).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessTokenType {
    /// RFC 6750 bearer token.
    Bearer,
    /// RFC 9449 DPoP-bound token.
    DPoP,
    /// Any other token type.
    Other(String),
}

impl AccessTokenType {
    /// Returns the wire value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bearer => "Bearer",
            Self::DPoP => "DPoP",
            Self::Other(value) => value,
        }
    }

    /// Parses a stored token type, case-insensitively for the known values.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("bearer") {
            Self::Bearer
        } else if value.eq_ignore_ascii_case("dpop") {
            Self::DPoP
        } else {
            Self::Other(value.to_string())
        }
    }
}

impl fmt::Display for AccessTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Token
// =============================================================================

/// Value and lifetime of an issued token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Opaque token value, unique per kind across the store.
    pub value: String,
    /// When the token was issued.
    pub issued_at: OffsetDateTime,
    /// When the token expires (`None` = does not expire).
    pub expires_at: Option<OffsetDateTime>,
    /// Caller-defined token metadata.
    pub metadata: Attributes,
}

impl Token {
    /// Creates a token without metadata.
    #[must_use]
    pub fn new(
        value: impl Into<String>,
        issued_at: OffsetDateTime,
        expires_at: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            value: value.into(),
            issued_at,
            expires_at,
            metadata: Attributes::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if the token expired at or before `now`.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Returns `true` if the token was explicitly invalidated.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.metadata
            .get(INVALIDATED_METADATA_KEY)
            .and_then(AttributeValue::as_bool)
            .unwrap_or(false)
    }

    /// Returns `true` if the token may be used at `now`.
    #[must_use]
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        !self.is_invalidated() && !self.is_expired(now) && now >= self.issued_at
    }

    pub(crate) fn invalidate(&mut self) {
        self.metadata
            .insert(INVALIDATED_METADATA_KEY.to_string(), AttributeValue::Bool(true));
    }
}

// =============================================================================
// Token Slot
// =============================================================================

/// A populated token slot.
///
/// Access and ID tokens carry extra fields; the other kinds are a bare
/// [`Token`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenSlot {
    /// Authorization code.
    AuthorizationCode(Token),
    /// Access token with its granted scopes and subtype.
    AccessToken {
        /// The token.
        token: Token,
        /// Token subtype.
        token_type: AccessTokenType,
        /// Scopes the token was issued for.
        scopes: BTreeSet<String>,
    },
    /// Refresh token.
    RefreshToken(Token),
    /// ID token with its claims.
    IdToken {
        /// The token.
        token: Token,
        /// ID token claims, kept apart from metadata.
        claims: Attributes,
    },
    /// Device flow user code.
    UserCode(Token),
    /// Device flow device code.
    DeviceCode(Token),
}

impl TokenSlot {
    /// Creates a bearer access token slot.
    #[must_use]
    pub fn bearer(token: Token, scopes: BTreeSet<String>) -> Self {
        Self::AccessToken {
            token,
            token_type: AccessTokenType::Bearer,
            scopes,
        }
    }

    /// Returns the kind of this slot.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        match self {
            Self::AuthorizationCode(_) => TokenKind::AuthorizationCode,
            Self::AccessToken { .. } => TokenKind::AccessToken,
            Self::RefreshToken(_) => TokenKind::RefreshToken,
            Self::IdToken { .. } => TokenKind::IdToken,
            Self::UserCode(_) => TokenKind::UserCode,
            Self::DeviceCode(_) => TokenKind::DeviceCode,
        }
    }

    /// Returns the token held by this slot.
    #[must_use]
    pub fn token(&self) -> &Token {
        match self {
            Self::AuthorizationCode(token)
            | Self::RefreshToken(token)
            | Self::UserCode(token)
            | Self::DeviceCode(token)
            | Self::AccessToken { token, .. }
            | Self::IdToken { token, .. } => token,
        }
    }

    /// Returns the token held by this slot mutably.
    pub fn token_mut(&mut self) -> &mut Token {
        match self {
            Self::AuthorizationCode(token)
            | Self::RefreshToken(token)
            | Self::UserCode(token)
            | Self::DeviceCode(token)
            | Self::AccessToken { token, .. }
            | Self::IdToken { token, .. } => token,
        }
    }
}
