//! PostgreSQL storage backend for Tenantry Auth
//!
//! Provides persistent storage for:
//!
//! - OAuth 2.0 / OIDC authorizations (`oauth2_authorization`)
//! - Registered client descriptors (`oauth2_registered_client`)
//!
//! Tables are created by [`schema::migrate`], which is safe to run on every
//! startup.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tenantry_auth::AuthorizationStore;
//! use tenantry_auth_postgres::PostgresAuthStorage;
//!
//! let storage = PostgresAuthStorage::connect("postgres://localhost/tenantry", 10).await?;
//! storage.migrate().await?;
//!
//! let store = AuthorizationStore::new(
//!     Arc::new(storage.authorizations()),
//!     Arc::new(storage.clients()),
//! );
//! ```

pub mod authorization;
pub mod client;
pub mod schema;
pub mod storage_adapters;

use std::sync::Arc;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use authorization::{AuthorizationStorage, PostgresAuthorizationStorage};
pub use client::{ClientRow, ClientStorage, PostgresClientLookup};
pub use storage_adapters::{ArcAuthorizationStorage, ArcClientLookup};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during auth storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// A unique constraint was violated. Carries the constraint name.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A value cannot be represented in the schema.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    // -------------------------------------------------------------------------
    // Constructor Methods
    // -------------------------------------------------------------------------

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    // -------------------------------------------------------------------------
    // Predicate Methods
    // -------------------------------------------------------------------------

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Returns `true` if this is a client error (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::InvalidInput(_))
    }

    /// Returns `true` if this is a server error (5xx equivalent).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// PostgreSQL Auth Storage
// =============================================================================

/// PostgreSQL storage backend for authorization data.
///
/// Holds a connection pool and hands out Arc-owning storage adapters.
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        use sqlx_core::pool::PoolOptions;
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the migration fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        schema::migrate(&self.pool).await
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    /// Get the authorization record storage.
    #[must_use]
    pub fn authorizations(&self) -> ArcAuthorizationStorage {
        ArcAuthorizationStorage::new(Arc::clone(&self.pool))
    }

    /// Get the registered client lookup.
    #[must_use]
    pub fn clients(&self) -> ArcClientLookup {
        ArcClientLookup::new(Arc::clone(&self.pool))
    }
}

// =============================================================================
// Tests
// =============================================================================
