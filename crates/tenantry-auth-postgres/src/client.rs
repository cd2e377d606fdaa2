//! Registered client lookup.
//!
//! Reads client descriptors from `oauth2_registered_client`. Grant types and
//! scopes are stored as comma-joined strings. Rows are written by the client
//! registration service, never by this crate.
//!
//! This module provides two layers:
//! - [`ClientStorage`] - Low-level row operations on `ClientRow`
//! - [`PostgresClientLookup`] - Implements the `ClientLookup` trait from `tenantry-auth`

use async_trait::async_trait;
use sqlx_core::query_as::query_as;

use tenantry_auth::resolver::{resolve_grant_type, resolve_scopes};
use tenantry_auth::storage::ClientLookup;
use tenantry_auth::types::ClientDescriptor;
use tenantry_auth::{AuthError, AuthResult};

use crate::{PgPool, StorageResult};

const LIST_DELIMITER: &str = ",";

// =============================================================================
// Types
// =============================================================================

/// Client record from database.
#[derive(Debug, Clone)]
pub struct ClientRow {
    /// Internal registration id
    pub id: String,
    /// Public OAuth `client_id`
    pub client_id: String,
    /// Display name
    pub client_name: String,
    /// Comma-joined grant types
    pub authorization_grant_types: Option<String>,
    /// Comma-joined scopes
    pub scopes: Option<String>,
}

impl ClientRow {
    /// Create from database tuple.
    fn from_tuple(row: (String, String, String, Option<String>, Option<String>)) -> Self {
        Self {
            id: row.0,
            client_id: row.1,
            client_name: row.2,
            authorization_grant_types: row.3,
            scopes: row.4,
        }
    }

    /// Convert to a client descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored grant type is blank.
    pub fn into_descriptor(self) -> AuthResult<ClientDescriptor> {
        let grant_types = resolve_scopes(self.authorization_grant_types.as_deref(), LIST_DELIMITER)
            .iter()
            .map(|gt| resolve_grant_type(gt))
            .collect::<AuthResult<Vec<_>>>()?;

        Ok(ClientDescriptor {
            id: self.id,
            client_id: self.client_id,
            client_name: self.client_name,
            grant_types,
            scopes: resolve_scopes(self.scopes.as_deref(), LIST_DELIMITER),
        })
    }
}

// =============================================================================
// Client Storage
// =============================================================================

/// Low-level registered client operations.
pub struct ClientStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ClientStorage<'a> {
    /// Create a new client storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a client by internal registration id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: &str) -> StorageResult<Option<ClientRow>> {
        let row: Option<(String, String, String, Option<String>, Option<String>)> = query_as(
            r#"
            SELECT id, client_id, client_name, authorization_grant_types, scopes
            FROM oauth2_registered_client
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ClientRow::from_tuple))
    }
}

// =============================================================================
// Trait Implementation
// =============================================================================

/// PostgreSQL implementation of the `ClientLookup` trait.
pub struct PostgresClientLookup<'a> {
    pool: &'a PgPool,
}

impl<'a> PostgresClientLookup<'a> {
    /// Create a new PostgreSQL client lookup.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientLookup for PostgresClientLookup<'_> {
    async fn find_client(&self, id: &str) -> AuthResult<Option<ClientDescriptor>> {
        let row = ClientStorage::new(self.pool)
            .find_by_id(id)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;

        row.map(ClientRow::into_descriptor).transpose()
    }
}

// =============================================================================
// Tests
// =============================================================================
