//! Arc-owning storage adapters.
//!
//! These adapters wrap the lifetime-based storage types and own an Arc<PgPool>,
//! allowing them to be used as `Arc<dyn AuthorizationRecordStorage>` and
//! `Arc<dyn ClientLookup>` by the authorization store and sweeper.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use tenantry_auth::AuthResult;
use tenantry_auth::record::AuthorizationRecord;
use tenantry_auth::storage::{AuthorizationRecordStorage, ClientLookup, TokenIndex};
use tenantry_auth::types::{ClientDescriptor, TokenKind};

use crate::PgPool;
use crate::authorization::PostgresAuthorizationStorage;
use crate::client::PostgresClientLookup;

// =============================================================================
// Arc-Owning Authorization Storage
// =============================================================================

/// Arc-owning PostgreSQL authorization storage adapter.
#[derive(Clone)]
pub struct ArcAuthorizationStorage {
    pool: Arc<PgPool>,
}

impl ArcAuthorizationStorage {
    /// Create a new Arc-owning authorization storage.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorizationRecordStorage for ArcAuthorizationStorage {
    async fn upsert(&self, record: &AuthorizationRecord) -> AuthResult<()> {
        PostgresAuthorizationStorage::new(&self.pool).upsert(record).await
    }

    async fn delete(&self, id: &str) -> AuthResult<()> {
        PostgresAuthorizationStorage::new(&self.pool).delete(id).await
    }

    async fn delete_by_client(&self, registered_client_id: &str) -> AuthResult<u64> {
        PostgresAuthorizationStorage::new(&self.pool)
            .delete_by_client(registered_client_id)
            .await
    }

    async fn find_by_id(&self, id: &str) -> AuthResult<Option<AuthorizationRecord>> {
        PostgresAuthorizationStorage::new(&self.pool).find_by_id(id).await
    }

    async fn find_by_index(
        &self,
        index: TokenIndex,
        value: &str,
    ) -> AuthResult<Option<AuthorizationRecord>> {
        PostgresAuthorizationStorage::new(&self.pool)
            .find_by_index(index, value)
            .await
    }

    async fn find_expired(
        &self,
        kind: TokenKind,
        as_of: OffsetDateTime,
    ) -> AuthResult<Vec<AuthorizationRecord>> {
        PostgresAuthorizationStorage::new(&self.pool)
            .find_expired(kind, as_of)
            .await
    }

    async fn delete_expired(&self, as_of: OffsetDateTime) -> AuthResult<u64> {
        PostgresAuthorizationStorage::new(&self.pool)
            .delete_expired(as_of)
            .await
    }
}

// =============================================================================
// Arc-Owning Client Lookup
// =============================================================================

/// Arc-owning PostgreSQL client lookup adapter.
#[derive(Clone)]
pub struct ArcClientLookup {
    pool: Arc<PgPool>,
}

impl ArcClientLookup {
    /// Create a new Arc-owning client lookup.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientLookup for ArcClientLookup {
    async fn find_client(&self, id: &str) -> AuthResult<Option<ClientDescriptor>> {
        PostgresClientLookup::new(&self.pool).find_client(id).await
    }
}
