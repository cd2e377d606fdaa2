//! Authorization store.
//!
//! Persists [`Grant`]s through an [`AuthorizationRecordStorage`] backing and
//! finds them again by id or by any single token value.
//!
//! # Lookup Protocol
//!
//! A protocol endpoint usually holds a bare string from a request and does
//! not know which kind of token it is. Without a hint the store probes
//! [`TokenIndex::PROBE_ORDER`] and returns the first match. With a hint only
//! that index is consulted, so a value stored under a different kind is not
//! returned.

use std::sync::Arc;

use tracing::instrument;

use crate::AuthResult;
use crate::error::redact_token;
use crate::mapper::AuthorizationMapper;
use crate::storage::{AuthorizationRecordStorage, ClientLookup, TokenIndex};
use crate::types::Grant;

/// Save/remove/find operations on authorizations.
#[derive(Clone)]
pub struct AuthorizationStore {
    storage: Arc<dyn AuthorizationRecordStorage>,
    clients: Arc<dyn ClientLookup>,
    mapper: AuthorizationMapper,
}

impl AuthorizationStore {
    /// Create a store over a backing and a client lookup.
    #[must_use]
    pub fn new(
        storage: Arc<dyn AuthorizationRecordStorage>,
        clients: Arc<dyn ClientLookup>,
    ) -> Self {
        Self {
            storage,
            clients,
            mapper: AuthorizationMapper::default(),
        }
    }

    /// Replace the record mapper (for a non-default scope delimiter).
    #[must_use]
    pub fn with_mapper(mut self, mapper: AuthorizationMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Returns the record backing.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn AuthorizationRecordStorage> {
        &self.storage
    }

    /// Returns the mapper.
    #[must_use]
    pub fn mapper(&self) -> &AuthorizationMapper {
        &self.mapper
    }

    /// Saves a grant, fully replacing any record with the same id.
    ///
    /// # Errors
    ///
    /// - `Codec` if a map holds an unsupported value (nothing is written)
    /// - `Conflict` if a token value belongs to another grant
    /// - `Storage` if the backing fails
    #[instrument(skip(self, grant), fields(grant_id = %grant.id()))]
    pub async fn save(&self, grant: &Grant) -> AuthResult<()> {
        let record = self.mapper.to_record(grant)?;
        self.storage
            .upsert(&record)
            .await
            .map_err(|e| e.with_context(grant.id(), None))?;
        tracing::debug!(slots = record.slots().count(), "Authorization saved");
        Ok(())
    }

    /// Removes a grant. Removing an unknown grant is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing fails.
    pub async fn remove(&self, grant: &Grant) -> AuthResult<()> {
        self.remove_by_id(grant.id()).await
    }

    /// Removes a grant by id. Removing an unknown id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing fails.
    #[instrument(skip(self))]
    pub async fn remove_by_id(&self, id: &str) -> AuthResult<()> {
        self.storage
            .delete(id)
            .await
            .map_err(|e| e.with_context(id, None))
    }

    /// Removes every grant of a registered client.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing fails.
    #[instrument(skip(self))]
    pub async fn remove_by_client(&self, registered_client_id: &str) -> AuthResult<u64> {
        let deleted = self
            .storage
            .delete_by_client(registered_client_id)
            .await
            .map_err(|e| e.within(format!("registered client '{registered_client_id}'")))?;
        if deleted > 0 {
            tracing::info!(deleted, "Removed authorizations of registered client");
        }
        Ok(deleted)
    }

    /// Finds a grant by id.
    ///
    /// # Errors
    ///
    /// - `ClientNotFound` if the record's client no longer exists
    /// - `Codec` / `InvalidRecord` if the record cannot be decoded
    /// - `Storage` if the backing fails
    pub async fn find_by_id(&self, id: &str) -> AuthResult<Option<Grant>> {
        let found = self
            .storage
            .find_by_id(id)
            .await
            .map_err(|e| e.with_context(id, None))?;
        match found {
            Some(record) => self
                .mapper
                .to_grant(&record, self.clients.as_ref())
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    /// Finds a grant by any of its token values.
    ///
    /// `Ok(None)` means the value is unknown (an `invalid_token` outcome,
    /// not a server error).
    ///
    /// # Errors
    ///
    /// Same as [`find_by_id`](Self::find_by_id).
    #[instrument(skip(self, value), fields(token_prefix = %redact_token(value)))]
    pub async fn find_by_token(
        &self,
        value: &str,
        hint: Option<TokenIndex>,
    ) -> AuthResult<Option<Grant>> {
        let hinted;
        let indexes: &[TokenIndex] = match hint {
            Some(index) => {
                hinted = [index];
                &hinted
            }
            None => &TokenIndex::PROBE_ORDER,
        };

        for &index in indexes {
            let found = self
                .storage
                .find_by_index(index, value)
                .await
                .map_err(|e| e.with_lookup_context(index, value))?;
            if let Some(record) = found {
                tracing::debug!(index = %index, grant_id = %record.id, "Token matched");
                return self
                    .mapper
                    .to_grant(&record, self.clients.as_ref())
                    .await
                    .map(Some);
            }
        }

        tracing::debug!("Token not found");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthError;
    use crate::codec::{AttributeValue, Attributes};
    use crate::record::AuthorizationRecord;
    use crate::storage::{InMemoryAuthorizationStorage, InMemoryClientRegistry};
    use crate::types::{
        AuthorizationGrantType, ClientDescriptor, STATE_ATTRIBUTE, Token, TokenKind, TokenSlot,
    };
    use std::collections::BTreeSet;
    use time::{Duration, OffsetDateTime};

    fn store_with_registry() -> (AuthorizationStore, Arc<InMemoryClientRegistry>) {
        let registry = Arc::new(InMemoryClientRegistry::with_clients([
            ClientDescriptor::new("tenant-admin", "Tenant Admin"),
            ClientDescriptor::new("tv-app", "Living Room TV"),
        ]));
        let store = AuthorizationStore::new(
            Arc::new(InMemoryAuthorizationStorage::new()),
            registry.clone(),
        );
        (store, registry)
    }

    fn store() -> AuthorizationStore {
        store_with_registry().0
    }

    fn code_grant() -> Grant {
        let now = OffsetDateTime::now_utc();
        Grant::builder(
            "tenant-admin",
            "alice",
            AuthorizationGrantType::AuthorizationCode,
        )
        .authorized_scopes(["openid", "tenants.read"])
        .attribute(STATE_ATTRIBUTE, "state-xyz-123")
        .token(TokenSlot::AuthorizationCode(Token::new(
            "code-11111111",
            now,
            Some(now + Duration::minutes(5)),
        )))
        .build()
    }

    fn exchanged(grant: &Grant) -> Grant {
        let now = OffsetDateTime::now_utc();
        let mut claims = Attributes::new();
        claims.insert("sub".into(), "alice".into());

        let mut updated = grant.clone();
        updated.invalidate(TokenKind::AuthorizationCode);
        updated.set_token(TokenSlot::bearer(
            Token::new("AT1-2222222222", now, Some(now + Duration::hours(1))),
            grant.authorized_scopes.clone(),
        ));
        updated.set_token(TokenSlot::RefreshToken(Token::new(
            "RT1-3333333333",
            now,
            Some(now + Duration::days(7)),
        )));
        updated.set_token(TokenSlot::IdToken {
            token: Token::new("ID1-4444444444", now, Some(now + Duration::hours(1))),
            claims,
        });
        updated
    }

    #[tokio::test]
    async fn test_lookup_consistency_for_every_slot() {
        let store = store();
        let grant = exchanged(&code_grant());
        store.save(&grant).await.unwrap();

        for slot in grant.slots() {
            let value = &slot.token().value;
            let hinted = store
                .find_by_token(value, Some(slot.kind().into()))
                .await
                .unwrap();
            assert_eq!(hinted.as_ref(), Some(&grant), "hinted {}", slot.kind());

            let probed = store.find_by_token(value, None).await.unwrap();
            assert_eq!(probed.as_ref(), Some(&grant), "probed {}", slot.kind());
        }

        let by_state = store
            .find_by_token("state-xyz-123", Some(TokenIndex::State))
            .await
            .unwrap();
        assert_eq!(by_state, Some(grant.clone()));
        assert_eq!(store.find_by_id(grant.id()).await.unwrap(), Some(grant));
    }

    #[tokio::test]
    async fn test_device_flow_slots() {
        let store = store();
        let now = OffsetDateTime::now_utc();
        let grant = Grant::builder(
            "tv-app",
            "bob",
            AuthorizationGrantType::Extension(AuthorizationGrantType::DEVICE_CODE.into()),
        )
        .token(TokenSlot::UserCode(Token::new(
            "WDJB-MJHT",
            now,
            Some(now + Duration::minutes(15)),
        )))
        .token(TokenSlot::DeviceCode(Token::new(
            "GmRhmhcxhwAzkoEqiMEg",
            now,
            Some(now + Duration::minutes(15)),
        )))
        .build();
        store.save(&grant).await.unwrap();

        let found = store
            .find_by_token("WDJB-MJHT", Some(TokenKind::UserCode.into()))
            .await
            .unwrap();
        assert_eq!(found, Some(grant.clone()));
        let found = store.find_by_token("GmRhmhcxhwAzkoEqiMEg", None).await.unwrap();
        assert_eq!(found, Some(grant));
    }

    #[tokio::test]
    async fn test_negative_lookup_is_not_an_error() {
        let store = store();
        store.save(&code_grant()).await.unwrap();

        assert_eq!(store.find_by_token("never-issued-value", None).await.unwrap(), None);
        assert_eq!(store.find_by_id("no-such-id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hinted_lookup_does_not_cross_slots() {
        let store = store();
        let grant = exchanged(&code_grant());
        store.save(&grant).await.unwrap();

        let found = store
            .find_by_token("AT1-2222222222", Some(TokenKind::RefreshToken.into()))
            .await
            .unwrap();
        assert_eq!(found, None);

        let found = store
            .find_by_token("code-11111111", Some(TokenKind::AccessToken.into()))
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_probe_order_prefers_earlier_index() {
        let store = store();
        let now = OffsetDateTime::now_utc();

        // Same string used as an access token in one grant and a refresh
        // token in another; the access token index is probed first.
        let a = Grant::builder("tenant-admin", "alice", AuthorizationGrantType::ClientCredentials)
            .token(TokenSlot::bearer(Token::new("shared-value-1", now, None), BTreeSet::new()))
            .build();
        let b = Grant::builder("tenant-admin", "bob", AuthorizationGrantType::RefreshToken)
            .token(TokenSlot::RefreshToken(Token::new("shared-value-1", now, None)))
            .build();
        store.save(&b).await.unwrap();
        store.save(&a).await.unwrap();

        let found = store.find_by_token("shared-value-1", None).await.unwrap();
        assert_eq!(found.unwrap().id(), a.id());
        let found = store
            .find_by_token("shared-value-1", Some(TokenKind::RefreshToken.into()))
            .await
            .unwrap();
        assert_eq!(found.unwrap().id(), b.id());
    }

    #[tokio::test]
    async fn test_idempotent_save_and_full_replace() {
        let store = store();
        let grant = code_grant();
        store.save(&grant).await.unwrap();
        store.save(&grant).await.unwrap();
        assert_eq!(store.find_by_id(grant.id()).await.unwrap(), Some(grant.clone()));

        // Progress the flow under the same id, dropping the code slot.
        let mut next = exchanged(&grant);
        next.remove_token(TokenKind::AuthorizationCode);
        next.attributes.remove(STATE_ATTRIBUTE);
        store.save(&next).await.unwrap();

        assert_eq!(store.find_by_id(grant.id()).await.unwrap(), Some(next));
        assert_eq!(store.find_by_token("code-11111111", None).await.unwrap(), None);
        assert_eq!(store.find_by_token("state-xyz-123", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_conflict_on_foreign_token_value() {
        let store = store();
        let first = exchanged(&code_grant());
        store.save(&first).await.unwrap();

        let now = OffsetDateTime::now_utc();
        let second = Grant::builder("tenant-admin", "mallory", AuthorizationGrantType::RefreshToken)
            .token(TokenSlot::RefreshToken(Token::new("RT1-3333333333", now, None)))
            .build();

        let err = store.save(&second).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(!err.to_string().contains("RT1-3333333333"));

        let owner = store.find_by_token("RT1-3333333333", None).await.unwrap();
        assert_eq!(owner.unwrap().id(), first.id());
        assert_eq!(store.find_by_id(second.id()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_codec_failure_aborts_save() {
        let store = store();
        let grant = code_grant()
            .to_builder()
            .attribute("score", AttributeValue::Float(f64::INFINITY))
            .build();

        assert!(store.save(&grant).await.unwrap_err().is_codec_error());
        assert_eq!(store.find_by_id(grant.id()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = store();
        let grant = exchanged(&code_grant());
        store.save(&grant).await.unwrap();

        store.remove(&grant).await.unwrap();
        store.remove(&grant).await.unwrap();
        store.remove_by_id("never-existed").await.unwrap();

        assert_eq!(store.find_by_id(grant.id()).await.unwrap(), None);
        assert_eq!(store.find_by_token("AT1-2222222222", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_orphaned_record_and_client_cleanup() {
        let (store, registry) = store_with_registry();
        let grant = exchanged(&code_grant());
        store.save(&grant).await.unwrap();

        registry.unregister("tenant-admin");
        let err = store
            .find_by_token("AT1-2222222222", None)
            .await
            .unwrap_err();
        assert!(err.is_client_not_found());

        assert_eq!(store.remove_by_client("tenant-admin").await.unwrap(), 1);
        assert_eq!(store.find_by_token("AT1-2222222222", None).await.unwrap(), None);
    }

    /// Backing whose every operation fails like a dropped connection.
    struct UnavailableStorage;

    #[async_trait::async_trait]
    impl AuthorizationRecordStorage for UnavailableStorage {
        async fn upsert(&self, _: &AuthorizationRecord) -> AuthResult<()> {
            Err(AuthError::storage("connection reset"))
        }

        async fn delete(&self, _: &str) -> AuthResult<()> {
            Err(AuthError::storage("connection reset"))
        }

        async fn delete_by_client(&self, _: &str) -> AuthResult<u64> {
            Err(AuthError::storage("connection reset"))
        }

        async fn find_by_id(&self, _: &str) -> AuthResult<Option<AuthorizationRecord>> {
            Err(AuthError::storage("connection reset"))
        }

        async fn find_by_index(
            &self,
            _: TokenIndex,
            _: &str,
        ) -> AuthResult<Option<AuthorizationRecord>> {
            Err(AuthError::storage("connection reset"))
        }

        async fn find_expired(
            &self,
            _: TokenKind,
            _: OffsetDateTime,
        ) -> AuthResult<Vec<AuthorizationRecord>> {
            Err(AuthError::storage("connection reset"))
        }

        async fn delete_expired(&self, _: OffsetDateTime) -> AuthResult<u64> {
            Err(AuthError::storage("connection reset"))
        }
    }

    #[tokio::test]
    async fn test_backing_failures_carry_grant_and_token_context() {
        let store = AuthorizationStore::new(
            Arc::new(UnavailableStorage),
            Arc::new(InMemoryClientRegistry::new()),
        );

        let err = store.find_by_id("grant-42").await.unwrap_err();
        assert!(err.is_server_error());
        assert!(err.to_string().contains("authorization 'grant-42'"));

        let err = store
            .find_by_token("AT1-2222222222-secret", Some(TokenKind::AccessToken.into()))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("access_token lookup 'AT1-2222…'"), "{message}");
        assert!(!message.contains("secret"));

        // Unhinted lookups fail on the first index tried.
        let err = store.find_by_token("state-xyz-123", None).await.unwrap_err();
        assert!(err.to_string().contains("state lookup"));

        let err = store.remove_by_client("tenant-admin").await.unwrap_err();
        assert!(err.to_string().contains("registered client 'tenant-admin'"));

        let grant = code_grant();
        let err = store.save(&grant).await.unwrap_err();
        assert!(err.to_string().contains(grant.id()));
    }
}
