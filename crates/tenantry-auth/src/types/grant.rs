//! The authorization (grant) aggregate.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use super::grant_type::AuthorizationGrantType;
use super::token::{Token, TokenKind, TokenSlot};
use crate::codec::{AttributeValue, Attributes};

/// Attribute key holding the OAuth 2.0 `state` request parameter.
pub const STATE_ATTRIBUTE: &str = "state";

/// The full record of one OAuth2/OIDC flow instance.
///
/// Holds at most one token per [`TokenKind`]; setting a slot replaces the
/// previous token of that kind. The id is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    id: String,
    /// Registered client this authorization was issued to.
    pub registered_client_id: String,
    /// Authenticated subject.
    pub principal_name: String,
    /// Grant type that started the flow.
    pub authorization_grant_type: AuthorizationGrantType,
    /// Scopes the resource owner authorized.
    pub authorized_scopes: BTreeSet<String>,
    /// Caller-defined session state.
    pub attributes: Attributes,
    tokens: BTreeMap<TokenKind, TokenSlot>,
}

impl Grant {
    /// Starts building a grant with a freshly generated id.
    #[must_use]
    pub fn builder(
        registered_client_id: impl Into<String>,
        principal_name: impl Into<String>,
        grant_type: AuthorizationGrantType,
    ) -> GrantBuilder {
        GrantBuilder::new(
            Uuid::new_v4().to_string(),
            registered_client_id,
            principal_name,
            grant_type,
        )
    }

    /// Starts building a grant with a known id (for example when loading).
    #[must_use]
    pub fn builder_with_id(
        id: impl Into<String>,
        registered_client_id: impl Into<String>,
        principal_name: impl Into<String>,
        grant_type: AuthorizationGrantType,
    ) -> GrantBuilder {
        GrantBuilder::new(id, registered_client_id, principal_name, grant_type)
    }

    /// Returns a builder pre-populated from this grant, keeping its id.
    #[must_use]
    pub fn to_builder(&self) -> GrantBuilder {
        GrantBuilder {
            grant: self.clone(),
        }
    }

    /// Returns the immutable grant id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the slot of the given kind, if populated.
    #[must_use]
    pub fn slot(&self, kind: TokenKind) -> Option<&TokenSlot> {
        self.tokens.get(&kind)
    }

    /// Returns the token of the given kind, if populated.
    #[must_use]
    pub fn token(&self, kind: TokenKind) -> Option<&Token> {
        self.tokens.get(&kind).map(TokenSlot::token)
    }

    /// Iterates populated slots in probe order.
    pub fn slots(&self) -> impl Iterator<Item = &TokenSlot> {
        self.tokens.values()
    }

    /// Finds the populated slot whose value equals `value`.
    #[must_use]
    pub fn slot_by_value(&self, value: &str) -> Option<&TokenSlot> {
        self.tokens.values().find(|slot| slot.token().value == value)
    }

    /// Replaces the slot of the same kind.
    pub fn set_token(&mut self, slot: TokenSlot) {
        self.tokens.insert(slot.kind(), slot);
    }

    /// Clears a slot, returning its previous contents.
    pub fn remove_token(&mut self, kind: TokenKind) -> Option<TokenSlot> {
        self.tokens.remove(&kind)
    }

    /// Returns the `state` parameter stored in the attributes, if it is a string.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.attributes
            .get(STATE_ATTRIBUTE)
            .and_then(AttributeValue::as_str)
    }

    /// Marks a token invalidated.
    ///
    /// Invalidating a refresh token also invalidates the access token and
    /// authorization code; invalidating an access token also invalidates the
    /// authorization code. Returns `false` if the slot is empty.
    pub fn invalidate(&mut self, kind: TokenKind) -> bool {
        let Some(slot) = self.tokens.get_mut(&kind) else {
            return false;
        };
        slot.token_mut().invalidate();

        let cascade: &[TokenKind] = match kind {
            TokenKind::RefreshToken => &[TokenKind::AccessToken, TokenKind::AuthorizationCode],
            TokenKind::AccessToken => &[TokenKind::AuthorizationCode],
            _ => &[],
        };
        for dependent in cascade {
            if let Some(slot) = self.tokens.get_mut(dependent) {
                slot.token_mut().invalidate();
            }
        }
        true
    }
}

/// Fluent builder for [`Grant`].
#[derive(Debug, Clone)]
pub struct GrantBuilder {
    grant: Grant,
}

impl GrantBuilder {
    fn new(
        id: impl Into<String>,
        registered_client_id: impl Into<String>,
        principal_name: impl Into<String>,
        grant_type: AuthorizationGrantType,
    ) -> Self {
        Self {
            grant: Grant {
                id: id.into(),
                registered_client_id: registered_client_id.into(),
                principal_name: principal_name.into(),
                authorization_grant_type: grant_type,
                authorized_scopes: BTreeSet::new(),
                attributes: Attributes::new(),
                tokens: BTreeMap::new(),
            },
        }
    }

    /// Sets the authorized scopes.
    #[must_use]
    pub fn authorized_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grant.authorized_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.grant.attributes.insert(key.into(), value.into());
        self
    }

    /// Replaces all attributes.
    #[must_use]
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.grant.attributes = attributes;
        self
    }

    /// Sets a token slot, replacing any previous token of the same kind.
    #[must_use]
    pub fn token(mut self, slot: TokenSlot) -> Self {
        self.grant.set_token(slot);
        self
    }

    /// Builds the grant.
    #[must_use]
    pub fn build(self) -> Grant {
        self.grant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn token(value: &str) -> Token {
        Token::new(value, OffsetDateTime::now_utc(), None)
    }

    #[test]
    fn test_builder_generates_distinct_ids() {
        let a = Grant::builder("c", "alice", AuthorizationGrantType::AuthorizationCode).build();
        let b = Grant::builder("c", "alice", AuthorizationGrantType::AuthorizationCode).build();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_one_token_per_kind() {
        let mut grant = Grant::builder("c", "alice", AuthorizationGrantType::AuthorizationCode)
            .token(TokenSlot::AuthorizationCode(token("code-1")))
            .token(TokenSlot::AuthorizationCode(token("code-2")))
            .build();
        assert_eq!(grant.slots().count(), 1);
        assert_eq!(
            grant.token(TokenKind::AuthorizationCode).unwrap().value,
            "code-2"
        );

        grant.set_token(TokenSlot::RefreshToken(token("rt")));
        assert_eq!(grant.slots().count(), 2);
        assert!(grant.remove_token(TokenKind::AuthorizationCode).is_some());
        assert!(grant.token(TokenKind::AuthorizationCode).is_none());
    }

    #[test]
    fn test_to_builder_keeps_id() {
        let grant = Grant::builder("c", "alice", AuthorizationGrantType::ClientCredentials).build();
        let updated = grant
            .to_builder()
            .token(TokenSlot::bearer(token("at"), BTreeSet::new()))
            .build();
        assert_eq!(updated.id(), grant.id());
        assert!(updated.slot_by_value("at").is_some());
    }

    #[test]
    fn test_state_attribute() {
        let grant = Grant::builder("c", "alice", AuthorizationGrantType::AuthorizationCode)
            .attribute(STATE_ATTRIBUTE, "xyz")
            .build();
        assert_eq!(grant.state(), Some("xyz"));

        let grant = Grant::builder("c", "alice", AuthorizationGrantType::AuthorizationCode)
            .attribute(STATE_ATTRIBUTE, 7)
            .build();
        assert_eq!(grant.state(), None);
    }

    #[test]
    fn test_invalidate_refresh_token_cascades() {
        let mut grant = Grant::builder("c", "alice", AuthorizationGrantType::AuthorizationCode)
            .token(TokenSlot::AuthorizationCode(token("code")))
            .token(TokenSlot::bearer(token("at"), BTreeSet::new()))
            .token(TokenSlot::RefreshToken(token("rt")))
            .token(TokenSlot::IdToken {
                token: token("id"),
                claims: Attributes::new(),
            })
            .build();

        assert!(grant.invalidate(TokenKind::RefreshToken));
        assert!(grant.token(TokenKind::RefreshToken).unwrap().is_invalidated());
        assert!(grant.token(TokenKind::AccessToken).unwrap().is_invalidated());
        assert!(
            grant
                .token(TokenKind::AuthorizationCode)
                .unwrap()
                .is_invalidated()
        );
        assert!(!grant.token(TokenKind::IdToken).unwrap().is_invalidated());
    }

    #[test]
    fn test_invalidate_access_token_leaves_refresh_token() {
        let mut grant = Grant::builder("c", "alice", AuthorizationGrantType::AuthorizationCode)
            .token(TokenSlot::AuthorizationCode(token("code")))
            .token(TokenSlot::bearer(token("at"), BTreeSet::new()))
            .token(TokenSlot::RefreshToken(token("rt")))
            .build();

        assert!(grant.invalidate(TokenKind::AccessToken));
        assert!(
            grant
                .token(TokenKind::AuthorizationCode)
                .unwrap()
                .is_invalidated()
        );
        assert!(!grant.token(TokenKind::RefreshToken).unwrap().is_invalidated());
        assert!(!grant.invalidate(TokenKind::DeviceCode));
    }
}
