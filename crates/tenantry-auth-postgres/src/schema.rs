//! Table definitions for authorization storage.
//!
//! Statements are idempotent and run one at a time, so the migration can be
//! applied on every startup.
//!
//! Token timestamps are `BIGINT` nanoseconds since the Unix epoch. `TIMESTAMPTZ`
//! keeps only microseconds, which would make a grant read back unequal to the
//! one saved.

use sqlx_core::query::query;
use tracing::{info, instrument};

use tenantry_auth::types::TokenKind;

use crate::{PgPool, StorageResult};

/// Authorization table name.
pub const AUTHORIZATION_TABLE: &str = "oauth2_authorization";

/// Registered client table name.
pub const CLIENT_TABLE: &str = "oauth2_registered_client";

const CREATE_AUTHORIZATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS oauth2_authorization (
    id TEXT PRIMARY KEY,
    registered_client_id TEXT NOT NULL,
    principal_name TEXT NOT NULL,
    authorization_grant_type TEXT NOT NULL,
    authorized_scopes TEXT,
    attributes TEXT,
    state TEXT,
    authorization_code_value TEXT,
    authorization_code_issued_at BIGINT,
    authorization_code_expires_at BIGINT,
    authorization_code_metadata TEXT,
    access_token_value TEXT,
    access_token_issued_at BIGINT,
    access_token_expires_at BIGINT,
    access_token_metadata TEXT,
    access_token_type TEXT,
    access_token_scopes TEXT,
    refresh_token_value TEXT,
    refresh_token_issued_at BIGINT,
    refresh_token_expires_at BIGINT,
    refresh_token_metadata TEXT,
    oidc_id_token_value TEXT,
    oidc_id_token_issued_at BIGINT,
    oidc_id_token_expires_at BIGINT,
    oidc_id_token_metadata TEXT,
    oidc_id_token_claims TEXT,
    user_code_value TEXT,
    user_code_issued_at BIGINT,
    user_code_expires_at BIGINT,
    user_code_metadata TEXT,
    device_code_value TEXT,
    device_code_issued_at BIGINT,
    device_code_expires_at BIGINT,
    device_code_metadata TEXT
)
"#;

const CREATE_CLIENT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS oauth2_registered_client (
    id TEXT PRIMARY KEY,
    client_id TEXT UNIQUE NOT NULL,
    client_name TEXT NOT NULL,
    authorization_grant_types TEXT,
    scopes TEXT
)
"#;

const CREATE_SUPPORTING_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS oauth2_authorization_state_idx \
     ON oauth2_authorization (state) WHERE state IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS oauth2_authorization_client_idx \
     ON oauth2_authorization (registered_client_id)",
];

/// Column group of one token slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotColumns {
    pub value: &'static str,
    pub issued_at: &'static str,
    pub expires_at: &'static str,
    pub metadata: &'static str,
    /// Name of the partial unique index on `value`.
    pub unique_index: &'static str,
}

/// Returns the column group for a token kind.
#[must_use]
pub const fn slot_columns(kind: TokenKind) -> SlotColumns {
    match kind {
        TokenKind::AuthorizationCode => SlotColumns {
            value: "authorization_code_value",
            issued_at: "authorization_code_issued_at",
            expires_at: "authorization_code_expires_at",
            metadata: "authorization_code_metadata",
            unique_index: "oauth2_authorization_authorization_code_value_key",
        },
        TokenKind::AccessToken => SlotColumns {
            value: "access_token_value",
            issued_at: "access_token_issued_at",
            expires_at: "access_token_expires_at",
            metadata: "access_token_metadata",
            unique_index: "oauth2_authorization_access_token_value_key",
        },
        TokenKind::RefreshToken => SlotColumns {
            value: "refresh_token_value",
            issued_at: "refresh_token_issued_at",
            expires_at: "refresh_token_expires_at",
            metadata: "refresh_token_metadata",
            unique_index: "oauth2_authorization_refresh_token_value_key",
        },
        TokenKind::IdToken => SlotColumns {
            value: "oidc_id_token_value",
            issued_at: "oidc_id_token_issued_at",
            expires_at: "oidc_id_token_expires_at",
            metadata: "oidc_id_token_metadata",
            unique_index: "oauth2_authorization_oidc_id_token_value_key",
        },
        TokenKind::UserCode => SlotColumns {
            value: "user_code_value",
            issued_at: "user_code_issued_at",
            expires_at: "user_code_expires_at",
            metadata: "user_code_metadata",
            unique_index: "oauth2_authorization_user_code_value_key",
        },
        TokenKind::DeviceCode => SlotColumns {
            value: "device_code_value",
            issued_at: "device_code_issued_at",
            expires_at: "device_code_expires_at",
            metadata: "device_code_metadata",
            unique_index: "oauth2_authorization_device_code_value_key",
        },
    }
}

/// Maps a unique index name back to the token kind it guards.
#[must_use]
pub fn kind_for_unique_index(name: &str) -> Option<TokenKind> {
    TokenKind::ALL
        .into_iter()
        .find(|kind| slot_columns(*kind).unique_index == name)
}

/// Create tables and indexes if they do not exist.
///
/// # Errors
///
/// Returns an error if any statement fails.
#[instrument(skip(pool))]
pub async fn migrate(pool: &PgPool) -> StorageResult<()> {
    query(CREATE_AUTHORIZATION_TABLE).execute(pool).await?;
    query(CREATE_CLIENT_TABLE).execute(pool).await?;

    for kind in TokenKind::ALL {
        let columns = slot_columns(kind);
        let sql = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {index} ON {AUTHORIZATION_TABLE} ({value}) \
             WHERE {value} IS NOT NULL",
            index = columns.unique_index,
            value = columns.value,
        );
        query(&sql).execute(pool).await?;
    }

    for sql in CREATE_SUPPORTING_INDEXES {
        query(sql).execute(pool).await?;
    }

    info!("Authorization schema is up to date");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_columns_share_kind_prefix() {
        for kind in TokenKind::ALL {
            let columns = slot_columns(kind);
            let prefix = columns.value.trim_end_matches("_value");
            assert!(columns.issued_at.starts_with(prefix));
            assert!(columns.expires_at.starts_with(prefix));
            assert!(columns.metadata.starts_with(prefix));
            assert!(CREATE_AUTHORIZATION_TABLE.contains(columns.value));
            assert!(CREATE_AUTHORIZATION_TABLE.contains(columns.expires_at));
        }
    }

    #[test]
    fn test_timestamps_are_nanosecond_integers() {
        assert!(!CREATE_AUTHORIZATION_TABLE.contains("TIMESTAMP"));
        for kind in TokenKind::ALL {
            let columns = slot_columns(kind);
            for column in [columns.issued_at, columns.expires_at] {
                assert!(
                    CREATE_AUTHORIZATION_TABLE.contains(&format!("{column} BIGINT")),
                    "{column} is not BIGINT"
                );
            }
        }
    }

    #[test]
    fn test_unique_index_round_trip() {
        for kind in TokenKind::ALL {
            let index = slot_columns(kind).unique_index;
            assert_eq!(kind_for_unique_index(index), Some(kind));
        }
        assert_eq!(kind_for_unique_index("oauth2_authorization_pkey"), None);
    }
}
