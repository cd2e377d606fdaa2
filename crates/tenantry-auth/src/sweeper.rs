//! Expiry sweeper.
//!
//! Removes authorizations whose tokens have expired. The policy is coarse:
//! a grant is deleted as soon as **any** populated slot is expired, even if
//! another slot (typically the refresh token) is still valid.
//!
//! Each pass captures its cutoff once and uses it for the whole pass, so a
//! grant refreshed mid-sweep with a later expiry is not caught by it.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::SweeperConfig;
use crate::mapper::AuthorizationMapper;
use crate::storage::{AuthorizationRecordStorage, ClientLookup};
use crate::store::AuthorizationStore;
use crate::types::{Grant, TokenKind};

/// Batch scan and deletion of expired authorizations.
pub struct ExpirySweeper {
    storage: Arc<dyn AuthorizationRecordStorage>,
    clients: Arc<dyn ClientLookup>,
    mapper: AuthorizationMapper,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a sweeper running every `config.interval`.
    #[must_use]
    pub fn new(
        storage: Arc<dyn AuthorizationRecordStorage>,
        clients: Arc<dyn ClientLookup>,
        config: &SweeperConfig,
    ) -> Self {
        Self {
            storage,
            clients,
            mapper: AuthorizationMapper::default(),
            interval: config.interval,
        }
    }

    /// Create a sweeper sharing an authorization store's backing and mapper.
    #[must_use]
    pub fn for_store(
        store: &AuthorizationStore,
        clients: Arc<dyn ClientLookup>,
        config: &SweeperConfig,
    ) -> Self {
        Self {
            storage: Arc::clone(store.storage()),
            clients,
            mapper: store.mapper().clone(),
            interval: config.interval,
        }
    }

    /// Finds grants whose `kind` slot is populated and expired at or before `as_of`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing fails or a record cannot be mapped
    /// (including `ClientNotFound` for orphaned records).
    pub async fn find_expired(&self, kind: TokenKind, as_of: OffsetDateTime) -> AuthResult<Vec<Grant>> {
        let records = self
            .storage
            .find_expired(kind, as_of)
            .await
            .map_err(|e| e.within(format!("expired {kind} scan as of {as_of}")))?;
        let mut grants = Vec::with_capacity(records.len());
        for record in &records {
            grants.push(self.mapper.to_grant(record, self.clients.as_ref()).await?);
        }
        Ok(grants)
    }

    /// Counts records whose `kind` slot is populated and expired at or before
    /// `as_of`. Records are not mapped, so orphaned ones are counted as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing fails.
    pub async fn count_expired(&self, kind: TokenKind, as_of: OffsetDateTime) -> AuthResult<usize> {
        self.storage
            .find_expired(kind, as_of)
            .await
            .map(|records| records.len())
            .map_err(|e| e.within(format!("expired {kind} scan as of {as_of}")))
    }

    /// Deletes every grant with at least one slot expired at or before `as_of`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing fails.
    pub async fn delete_expired(&self, as_of: OffsetDateTime) -> AuthResult<u64> {
        self.storage
            .delete_expired(as_of)
            .await
            .map_err(|e| e.within(format!("expiry sweep as of {as_of}")))
    }

    /// Runs one sweep pass with a cutoff of now.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing fails.
    pub async fn run_once(&self) -> AuthResult<u64> {
        let as_of = OffsetDateTime::now_utc();
        let deleted = self.delete_expired(as_of).await?;
        if deleted > 0 {
            tracing::info!(deleted, as_of = %as_of, "Swept expired authorizations");
        }
        Ok(deleted)
    }

    /// Starts the periodic background sweep.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                match self.run_once().await {
                    Ok(deleted) => {
                        tracing::debug!(deleted, "Authorization sweep completed");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Authorization sweep failed");
                    }
                }
            }
        })
    }
}
