//! Conversion between [`Grant`] and [`AuthorizationRecord`].
//!
//! Flattening is pure. Rehydration consults a [`ClientLookup`] because a
//! record whose registered client has disappeared cannot be turned back into
//! a usable grant.

use std::collections::BTreeSet;

use crate::codec::{decode_optional, encode_optional};
use crate::record::{AuthorizationRecord, StoredToken};
use crate::resolver::{DEFAULT_SCOPE_DELIMITER, join_scopes, resolve_grant_type, resolve_scopes};
use crate::storage::ClientLookup;
use crate::types::{AccessTokenType, Grant, Token, TokenKind, TokenSlot};
use crate::{AuthError, AuthResult};

/// Maps grants to records and back.
#[derive(Debug, Clone)]
pub struct AuthorizationMapper {
    scope_delimiter: String,
}

impl Default for AuthorizationMapper {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPE_DELIMITER)
    }
}

impl AuthorizationMapper {
    /// Create a mapper joining scope sets with `scope_delimiter`.
    #[must_use]
    pub fn new(scope_delimiter: impl Into<String>) -> Self {
        Self {
            scope_delimiter: scope_delimiter.into(),
        }
    }

    /// Delimiter used for scope sets.
    #[must_use]
    pub fn scope_delimiter(&self) -> &str {
        &self.scope_delimiter
    }

    /// Flattens a grant into its persisted record.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if attributes, metadata or claims hold a value the
    /// codec cannot store, and `InvalidRecord` for an empty token value or a
    /// scope that would not survive being joined and split again (blank,
    /// padded with whitespace, or containing the delimiter).
    /// No partial record is produced.
    pub fn to_record(&self, grant: &Grant) -> AuthResult<AuthorizationRecord> {
        let id = grant.id();
        let mut record = AuthorizationRecord {
            id: id.to_string(),
            registered_client_id: grant.registered_client_id.clone(),
            principal_name: grant.principal_name.clone(),
            authorization_grant_type: grant.authorization_grant_type.as_str().to_string(),
            authorized_scopes: self.join_checked(id, "authorized scope", &grant.authorized_scopes)?,
            attributes: encode_optional(&grant.attributes).map_err(|e| e.with_context(id, None))?,
            state: grant.state().map(str::to_string),
            ..Default::default()
        };

        for slot in grant.slots() {
            let kind = slot.kind();
            let token = slot.token();
            if token.value.is_empty() {
                return Err(AuthError::invalid_record(
                    id,
                    format!("{kind} value cannot be empty"),
                ));
            }

            *record.slot_mut(kind) = Some(StoredToken {
                value: token.value.clone(),
                issued_at: Some(token.issued_at),
                expires_at: token.expires_at,
                metadata: encode_optional(&token.metadata)
                    .map_err(|e| e.with_context(id, Some(kind)))?,
            });

            match slot {
                TokenSlot::AccessToken {
                    token_type, scopes, ..
                } => {
                    record.access_token_type = Some(token_type.as_str().to_string());
                    record.access_token_scopes = self.join_checked(id, "access token scope", scopes)?;
                }
                TokenSlot::IdToken { claims, .. } => {
                    record.oidc_id_token_claims =
                        encode_optional(claims).map_err(|e| e.with_context(id, Some(kind)))?;
                }
                _ => {}
            }
        }

        Ok(record)
    }

    /// Rebuilds a grant from its persisted record.
    ///
    /// # Errors
    ///
    /// - `ClientNotFound` if the registered client no longer exists
    /// - `InvalidRecord` for a blank grant type or a slot without `issued_at`
    /// - `Codec` if a stored map cannot be decoded
    pub async fn to_grant(
        &self,
        record: &AuthorizationRecord,
        clients: &dyn ClientLookup,
    ) -> AuthResult<Grant> {
        let id = record.id.as_str();

        if clients
            .find_client(&record.registered_client_id)
            .await?
            .is_none()
        {
            tracing::warn!(
                grant_id = %id,
                client_id = %record.registered_client_id,
                "Authorization references a registered client that no longer exists"
            );
            return Err(AuthError::client_not_found(&record.registered_client_id, id));
        }

        let grant_type = resolve_grant_type(&record.authorization_grant_type)
            .map_err(|_| AuthError::invalid_record(id, "authorization_grant_type is blank"))?;
        let attributes = decode_optional(record.attributes.as_deref())
            .map_err(|e| e.with_context(id, None))?;

        let mut builder = Grant::builder_with_id(
            id,
            &record.registered_client_id,
            &record.principal_name,
            grant_type,
        )
        .authorized_scopes(resolve_scopes(
            record.authorized_scopes.as_deref(),
            &self.scope_delimiter,
        ))
        .attributes(attributes);

        for (kind, stored) in record.slots() {
            let token = Self::token_from_stored(id, kind, stored)?;
            let slot = match kind {
                TokenKind::AuthorizationCode => TokenSlot::AuthorizationCode(token),
                TokenKind::AccessToken => TokenSlot::AccessToken {
                    token,
                    token_type: record
                        .access_token_type
                        .as_deref()
                        .map_or(AccessTokenType::Bearer, AccessTokenType::parse),
                    scopes: resolve_scopes(
                        record.access_token_scopes.as_deref(),
                        &self.scope_delimiter,
                    ),
                },
                TokenKind::RefreshToken => TokenSlot::RefreshToken(token),
                TokenKind::IdToken => TokenSlot::IdToken {
                    token,
                    claims: decode_optional(record.oidc_id_token_claims.as_deref())
                        .map_err(|e| e.with_context(id, Some(kind)))?,
                },
                TokenKind::UserCode => TokenSlot::UserCode(token),
                TokenKind::DeviceCode => TokenSlot::DeviceCode(token),
            };
            builder = builder.token(slot);
        }

        Ok(builder.build())
    }

    fn join_checked(
        &self,
        id: &str,
        what: &str,
        scopes: &BTreeSet<String>,
    ) -> AuthResult<Option<String>> {
        for scope in scopes {
            if scope.is_empty() || scope.trim() != scope {
                return Err(AuthError::invalid_record(
                    id,
                    format!("{what} '{scope}' is blank or padded with whitespace"),
                ));
            }
            if scope.contains(self.scope_delimiter.as_str()) {
                return Err(AuthError::invalid_record(
                    id,
                    format!(
                        "{what} '{scope}' contains the delimiter '{}'",
                        self.scope_delimiter
                    ),
                ));
            }
        }
        Ok(join_scopes(scopes, &self.scope_delimiter))
    }

    fn token_from_stored(id: &str, kind: TokenKind, stored: &StoredToken) -> AuthResult<Token> {
        let issued_at = stored
            .issued_at
            .ok_or_else(|| AuthError::invalid_record(id, format!("{kind} is missing issued_at")))?;

        Ok(Token {
            value: stored.value.clone(),
            issued_at,
            expires_at: stored.expires_at,
            metadata: decode_optional(stored.metadata.as_deref())
                .map_err(|e| e.with_context(id, Some(kind)))?,
        })
    }
}
