//! Authorization record storage.
//!
//! Each authorization is one row of `oauth2_authorization` with a fixed
//! column group per token kind. Token values are unique per kind through
//! partial unique indexes, so a collision surfaces as a unique violation
//! naming the index of the offending kind.
//!
//! This module provides two layers:
//! - [`AuthorizationStorage`] - Low-level row operations on `AuthorizationRecord`
//! - [`PostgresAuthorizationStorage`] - Implements `AuthorizationRecordStorage` from `tenantry-auth`

use async_trait::async_trait;
use sqlx_core::query::{Query, query};
use sqlx_core::row::Row;
use sqlx_postgres::{PgArguments, PgRow, Postgres};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use tenantry_auth::error::redact_token;
use tenantry_auth::record::{AuthorizationRecord, StoredToken};
use tenantry_auth::storage::{AuthorizationRecordStorage, TokenIndex};
use tenantry_auth::types::TokenKind;
use tenantry_auth::{AuthError, AuthResult};

use crate::schema::{AUTHORIZATION_TABLE, kind_for_unique_index, slot_columns};
use crate::{PgPool, StorageError, StorageResult};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

const COLUMNS: &str = "id, registered_client_id, principal_name, authorization_grant_type, \
    authorized_scopes, attributes, state, \
    authorization_code_value, authorization_code_issued_at, authorization_code_expires_at, authorization_code_metadata, \
    access_token_value, access_token_issued_at, access_token_expires_at, access_token_metadata, \
    access_token_type, access_token_scopes, \
    refresh_token_value, refresh_token_issued_at, refresh_token_expires_at, refresh_token_metadata, \
    oidc_id_token_value, oidc_id_token_issued_at, oidc_id_token_expires_at, oidc_id_token_metadata, \
    oidc_id_token_claims, \
    user_code_value, user_code_issued_at, user_code_expires_at, user_code_metadata, \
    device_code_value, device_code_issued_at, device_code_expires_at, device_code_metadata";

const UPSERT: &str = r#"
INSERT INTO oauth2_authorization (
    id, registered_client_id, principal_name, authorization_grant_type,
    authorized_scopes, attributes, state,
    authorization_code_value, authorization_code_issued_at, authorization_code_expires_at, authorization_code_metadata,
    access_token_value, access_token_issued_at, access_token_expires_at, access_token_metadata,
    access_token_type, access_token_scopes,
    refresh_token_value, refresh_token_issued_at, refresh_token_expires_at, refresh_token_metadata,
    oidc_id_token_value, oidc_id_token_issued_at, oidc_id_token_expires_at, oidc_id_token_metadata,
    oidc_id_token_claims,
    user_code_value, user_code_issued_at, user_code_expires_at, user_code_metadata,
    device_code_value, device_code_issued_at, device_code_expires_at, device_code_metadata
)
VALUES (
    $1, $2, $3, $4, $5, $6, $7,
    $8, $9, $10, $11,
    $12, $13, $14, $15, $16, $17,
    $18, $19, $20, $21,
    $22, $23, $24, $25, $26,
    $27, $28, $29, $30,
    $31, $32, $33, $34
)
ON CONFLICT (id) DO UPDATE SET
    registered_client_id = EXCLUDED.registered_client_id,
    principal_name = EXCLUDED.principal_name,
    authorization_grant_type = EXCLUDED.authorization_grant_type,
    authorized_scopes = EXCLUDED.authorized_scopes,
    attributes = EXCLUDED.attributes,
    state = EXCLUDED.state,
    authorization_code_value = EXCLUDED.authorization_code_value,
    authorization_code_issued_at = EXCLUDED.authorization_code_issued_at,
    authorization_code_expires_at = EXCLUDED.authorization_code_expires_at,
    authorization_code_metadata = EXCLUDED.authorization_code_metadata,
    access_token_value = EXCLUDED.access_token_value,
    access_token_issued_at = EXCLUDED.access_token_issued_at,
    access_token_expires_at = EXCLUDED.access_token_expires_at,
    access_token_metadata = EXCLUDED.access_token_metadata,
    access_token_type = EXCLUDED.access_token_type,
    access_token_scopes = EXCLUDED.access_token_scopes,
    refresh_token_value = EXCLUDED.refresh_token_value,
    refresh_token_issued_at = EXCLUDED.refresh_token_issued_at,
    refresh_token_expires_at = EXCLUDED.refresh_token_expires_at,
    refresh_token_metadata = EXCLUDED.refresh_token_metadata,
    oidc_id_token_value = EXCLUDED.oidc_id_token_value,
    oidc_id_token_issued_at = EXCLUDED.oidc_id_token_issued_at,
    oidc_id_token_expires_at = EXCLUDED.oidc_id_token_expires_at,
    oidc_id_token_metadata = EXCLUDED.oidc_id_token_metadata,
    oidc_id_token_claims = EXCLUDED.oidc_id_token_claims,
    user_code_value = EXCLUDED.user_code_value,
    user_code_issued_at = EXCLUDED.user_code_issued_at,
    user_code_expires_at = EXCLUDED.user_code_expires_at,
    user_code_metadata = EXCLUDED.user_code_metadata,
    device_code_value = EXCLUDED.device_code_value,
    device_code_issued_at = EXCLUDED.device_code_issued_at,
    device_code_expires_at = EXCLUDED.device_code_expires_at,
    device_code_metadata = EXCLUDED.device_code_metadata
"#;

// =============================================================================
// Row Mapping
// =============================================================================

/// Encodes a timestamp as nanoseconds since the Unix epoch.
///
/// `i64` nanoseconds cover 1677-09-21 through 2262-04-11.
fn to_unix_nanos(at: OffsetDateTime) -> StorageResult<i64> {
    i64::try_from(at.unix_timestamp_nanos())
        .map_err(|_| StorageError::invalid_input(format!("timestamp {at} is outside the storable range")))
}

fn from_unix_nanos(nanos: i64) -> Result<OffsetDateTime, sqlx_core::Error> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|e| sqlx_core::Error::Decode(Box::new(e)))
}

fn timestamp_from_row(row: &PgRow, column: &str) -> Result<Option<OffsetDateTime>, sqlx_core::Error> {
    row.try_get::<Option<i64>, _>(column)?
        .map(from_unix_nanos)
        .transpose()
}

fn slot_from_row(row: &PgRow, kind: TokenKind) -> Result<Option<StoredToken>, sqlx_core::Error> {
    let columns = slot_columns(kind);
    let Some(value) = row.try_get::<Option<String>, _>(columns.value)? else {
        return Ok(None);
    };
    Ok(Some(StoredToken {
        value,
        issued_at: timestamp_from_row(row, columns.issued_at)?,
        expires_at: timestamp_from_row(row, columns.expires_at)?,
        metadata: row.try_get(columns.metadata)?,
    }))
}

fn record_from_row(row: &PgRow) -> Result<AuthorizationRecord, sqlx_core::Error> {
    let mut record = AuthorizationRecord {
        id: row.try_get("id")?,
        registered_client_id: row.try_get("registered_client_id")?,
        principal_name: row.try_get("principal_name")?,
        authorization_grant_type: row.try_get("authorization_grant_type")?,
        authorized_scopes: row.try_get("authorized_scopes")?,
        attributes: row.try_get("attributes")?,
        state: row.try_get("state")?,
        access_token_type: row.try_get("access_token_type")?,
        access_token_scopes: row.try_get("access_token_scopes")?,
        oidc_id_token_claims: row.try_get("oidc_id_token_claims")?,
        ..Default::default()
    };
    for kind in TokenKind::ALL {
        *record.slot_mut(kind) = slot_from_row(row, kind)?;
    }
    Ok(record)
}

fn bind_slot<'q>(q: PgQuery<'q>, slot: Option<&'q StoredToken>) -> StorageResult<PgQuery<'q>> {
    let issued_at = slot.and_then(|s| s.issued_at).map(to_unix_nanos).transpose()?;
    let expires_at = slot.and_then(|s| s.expires_at).map(to_unix_nanos).transpose()?;
    Ok(q.bind(slot.map(|s| s.value.as_str()))
        .bind(issued_at)
        .bind(expires_at)
        .bind(slot.and_then(|s| s.metadata.as_deref())))
}

/// `WHERE` predicate matching rows with any populated slot expired at `$1`.
fn any_slot_expired_predicate() -> String {
    TokenKind::ALL
        .into_iter()
        .map(|kind| format!("{} <= $1", slot_columns(kind).expires_at))
        .collect::<Vec<_>>()
        .join(" OR ")
}

// =============================================================================
// Authorization Storage
// =============================================================================

/// Low-level authorization row operations.
pub struct AuthorizationStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> AuthorizationStorage<'a> {
    /// Create a new authorization storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or fully replace a record by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` carrying the violated index name if a
    /// token value already belongs to another row, and
    /// `StorageError::InvalidInput` for a timestamp outside the storable range.
    #[instrument(skip(self, record), fields(grant_id = %record.id))]
    pub async fn upsert(&self, record: &AuthorizationRecord) -> StorageResult<()> {
        let mut q = query(UPSERT)
            .bind(record.id.as_str())
            .bind(record.registered_client_id.as_str())
            .bind(record.principal_name.as_str())
            .bind(record.authorization_grant_type.as_str())
            .bind(record.authorized_scopes.as_deref())
            .bind(record.attributes.as_deref())
            .bind(record.state.as_deref());

        q = bind_slot(q, record.authorization_code.as_ref())?;
        q = bind_slot(q, record.access_token.as_ref())?
            .bind(record.access_token_type.as_deref())
            .bind(record.access_token_scopes.as_deref());
        q = bind_slot(q, record.refresh_token.as_ref())?;
        q = bind_slot(q, record.oidc_id_token.as_ref())?.bind(record.oidc_id_token_claims.as_deref());
        q = bind_slot(q, record.user_code.as_ref())?;
        q = bind_slot(q, record.device_code.as_ref())?;

        q.execute(self.pool).await.map_err(|e| {
            if let sqlx_core::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::conflict(db_err.constraint().unwrap_or_default());
            }
            StorageError::from(e)
        })?;

        Ok(())
    }

    /// Delete a record by id. Returns `true` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> StorageResult<bool> {
        let result = query(
            r#"
            DELETE FROM oauth2_authorization
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every record of a registered client.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[instrument(skip(self))]
    pub async fn delete_by_client(&self, registered_client_id: &str) -> StorageResult<u64> {
        let result = query(
            r#"
            DELETE FROM oauth2_authorization
            WHERE registered_client_id = $1
            "#,
        )
        .bind(registered_client_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Find a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: &str) -> StorageResult<Option<AuthorizationRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM {AUTHORIZATION_TABLE} WHERE id = $1");
        let row = query(&sql).bind(id).fetch_optional(self.pool).await?;

        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    /// Find a record by the value in one token column group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_token_value(
        &self,
        kind: TokenKind,
        value: &str,
    ) -> StorageResult<Option<AuthorizationRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {AUTHORIZATION_TABLE} WHERE {} = $1",
            slot_columns(kind).value
        );
        let row = query(&sql).bind(value).fetch_optional(self.pool).await?;

        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    /// Find a record by its `state` value.
    ///
    /// `state` is not unique; the lowest id wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_state(&self, state: &str) -> StorageResult<Option<AuthorizationRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {AUTHORIZATION_TABLE} WHERE state = $1 ORDER BY id LIMIT 1"
        );
        let row = query(&sql).bind(state).fetch_optional(self.pool).await?;

        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    /// Find records whose `kind` slot expired at or before `as_of`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_expired(
        &self,
        kind: TokenKind,
        as_of: OffsetDateTime,
    ) -> StorageResult<Vec<AuthorizationRecord>> {
        let columns = slot_columns(kind);
        let sql = format!(
            "SELECT {COLUMNS} FROM {AUTHORIZATION_TABLE} \
             WHERE {value} IS NOT NULL AND {expires_at} <= $1 ORDER BY id",
            value = columns.value,
            expires_at = columns.expires_at,
        );
        let rows = query(&sql)
            .bind(to_unix_nanos(as_of)?)
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete every record with any slot expired at or before `as_of`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[instrument(skip(self))]
    pub async fn delete_expired(&self, as_of: OffsetDateTime) -> StorageResult<u64> {
        let sql = format!(
            "DELETE FROM {AUTHORIZATION_TABLE} WHERE {}",
            any_slot_expired_predicate()
        );
        let result = query(&sql)
            .bind(to_unix_nanos(as_of)?)
            .execute(self.pool)
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            debug!(deleted, "Deleted expired authorization rows");
        }

        Ok(deleted)
    }
}

// =============================================================================
// Trait Implementation
// =============================================================================

/// PostgreSQL implementation of the `AuthorizationRecordStorage` trait.
///
/// # Example
///
/// ```ignore
/// use tenantry_auth_postgres::PostgresAuthorizationStorage;
/// use tenantry_auth::storage::{AuthorizationRecordStorage, TokenIndex};
///
/// let storage = PostgresAuthorizationStorage::new(&pool);
/// let record = storage.find_by_index(TokenIndex::State, "af0ifjsldkj").await?;
/// ```
pub struct PostgresAuthorizationStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> PostgresAuthorizationStorage<'a> {
    /// Create a new PostgreSQL authorization storage.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    fn storage(&self) -> AuthorizationStorage<'_> {
        AuthorizationStorage::new(self.pool)
    }
}

/// Convert storage error to auth error.
pub(crate) fn map_storage_error(err: StorageError) -> AuthError {
    AuthError::storage(err.to_string())
}

/// Convert an upsert failure, resolving index violations to the token kind.
pub(crate) fn map_upsert_error(err: StorageError, record: &AuthorizationRecord) -> AuthError {
    if let StorageError::Conflict(ref index) = err
        && let Some(kind) = kind_for_unique_index(index)
        && let Some(slot) = record.slot(kind)
    {
        debug!(
            grant_id = %record.id,
            kind = %kind,
            token_prefix = %redact_token(&slot.value),
            "Token value already stored under another authorization"
        );
        return AuthError::conflict(&record.id, kind, &slot.value);
    }
    if let StorageError::InvalidInput(message) = err {
        return AuthError::invalid_record(&record.id, message);
    }
    map_storage_error(err)
}

#[async_trait]
impl AuthorizationRecordStorage for PostgresAuthorizationStorage<'_> {
    async fn upsert(&self, record: &AuthorizationRecord) -> AuthResult<()> {
        self.storage()
            .upsert(record)
            .await
            .map_err(|e| map_upsert_error(e, record))
    }

    async fn delete(&self, id: &str) -> AuthResult<()> {
        self.storage()
            .delete(id)
            .await
            .map(|_| ())
            .map_err(map_storage_error)
    }

    async fn delete_by_client(&self, registered_client_id: &str) -> AuthResult<u64> {
        self.storage()
            .delete_by_client(registered_client_id)
            .await
            .map_err(map_storage_error)
    }

    async fn find_by_id(&self, id: &str) -> AuthResult<Option<AuthorizationRecord>> {
        self.storage()
            .find_by_id(id)
            .await
            .map_err(map_storage_error)
    }

    async fn find_by_index(
        &self,
        index: TokenIndex,
        value: &str,
    ) -> AuthResult<Option<AuthorizationRecord>> {
        let found = match index {
            TokenIndex::State => self.storage().find_by_state(value).await,
            TokenIndex::Token(kind) => self.storage().find_by_token_value(kind, value).await,
        };
        found.map_err(map_storage_error)
    }

    async fn find_expired(
        &self,
        kind: TokenKind,
        as_of: OffsetDateTime,
    ) -> AuthResult<Vec<AuthorizationRecord>> {
        self.storage()
            .find_expired(kind, as_of)
            .await
            .map_err(map_storage_error)
    }

    async fn delete_expired(&self, as_of: OffsetDateTime) -> AuthResult<u64> {
        self.storage()
            .delete_expired(as_of)
            .await
            .map_err(map_storage_error)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn stored(value: &str) -> Option<StoredToken> {
        Some(StoredToken {
            value: value.to_string(),
            issued_at: Some(OffsetDateTime::now_utc()),
            expires_at: None,
            metadata: None,
        })
    }

    #[test]
    fn test_column_list_matches_upsert_binds() {
        let columns: Vec<&str> = COLUMNS.split(',').map(str::trim).collect();
        assert_eq!(columns.len(), 34);
        assert!(UPSERT.contains("$34"));
        assert!(!UPSERT.contains("$35"));
        for column in columns.iter().skip(1) {
            assert!(
                UPSERT.contains(&format!("{column} = EXCLUDED.{column}")),
                "{column} is not replaced on conflict"
            );
        }
    }

    #[test]
    fn test_expired_predicate_covers_every_slot() {
        let predicate = any_slot_expired_predicate();
        for kind in TokenKind::ALL {
            assert!(predicate.contains(slot_columns(kind).expires_at));
        }
        assert_eq!(predicate.matches(" OR ").count(), 5);
    }

    #[test]
    fn test_unique_violation_maps_to_token_conflict() {
        let record = AuthorizationRecord {
            id: "grant-2".to_string(),
            refresh_token: stored("rt-shared-value-0001"),
            ..Default::default()
        };
        let err = map_upsert_error(
            StorageError::conflict(slot_columns(TokenKind::RefreshToken).unique_index),
            &record,
        );
        match err {
            AuthError::Conflict {
                grant_id,
                kind,
                value_prefix,
            } => {
                assert_eq!(grant_id, "grant-2");
                assert_eq!(kind, TokenKind::RefreshToken);
                assert_eq!(value_prefix, "rt-share…");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_timestamps_keep_nanoseconds() {
        let at = datetime!(2024-05-01 10:00:00.123456789 UTC);
        let nanos = to_unix_nanos(at).unwrap();
        assert_eq!(nanos % 1_000, 789);
        assert_eq!(from_unix_nanos(nanos).unwrap(), at);

        let now = OffsetDateTime::now_utc();
        assert_eq!(from_unix_nanos(to_unix_nanos(now).unwrap()).unwrap(), now);
    }

    #[test]
    fn test_unstorable_timestamp_is_an_invalid_record() {
        let err = to_unix_nanos(datetime!(2300-01-01 00:00 UTC)).unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));

        let record = AuthorizationRecord {
            id: "grant-far-future".to_string(),
            ..Default::default()
        };
        let err = map_upsert_error(err, &record);
        assert!(matches!(err, AuthError::InvalidRecord { .. }));
        assert!(err.to_string().contains("grant-far-future"));
    }

    #[test]
    fn test_unknown_constraint_maps_to_storage_error() {
        let record = AuthorizationRecord::default();
        let err = map_upsert_error(StorageError::conflict("oauth2_authorization_pkey"), &record);
        assert!(err.is_server_error());
        assert!(!err.is_conflict());
    }
}
