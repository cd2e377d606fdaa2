//! In-memory authorization record storage.
//!
//! Records and the per-kind value indexes sit behind a single lock so the
//! uniqueness check and the write of an upsert happen atomically. No guard is
//! held across an `.await`, so a std lock is enough.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::authorization::{AuthorizationRecordStorage, TokenIndex};
use crate::error::redact_token;
use crate::record::AuthorizationRecord;
use crate::types::TokenKind;
use crate::{AuthError, AuthResult};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, AuthorizationRecord>,
    /// kind -> token value -> record id
    indexes: HashMap<TokenKind, HashMap<String, String>>,
}

impl Inner {
    fn unindex(&mut self, record: &AuthorizationRecord) {
        for (kind, slot) in record.slots() {
            if let Some(index) = self.indexes.get_mut(&kind)
                && index.get(&slot.value) == Some(&record.id)
            {
                index.remove(&slot.value);
            }
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.records.remove(id) {
            Some(record) => {
                self.unindex(&record);
                true
            }
            None => false,
        }
    }
}

/// In-memory [`AuthorizationRecordStorage`].
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationStorage {
    inner: RwLock<Inner>,
}

impl InMemoryAuthorizationStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> AuthResult<usize> {
        Ok(self.read()?.records.len())
    }

    /// Returns `true` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> AuthResult<bool> {
        Ok(self.read()?.records.is_empty())
    }

    fn read(&self) -> AuthResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| AuthError::internal("authorization storage lock poisoned"))
    }

    fn write(&self) -> AuthResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| AuthError::internal("authorization storage lock poisoned"))
    }
}

#[async_trait]
impl AuthorizationRecordStorage for InMemoryAuthorizationStorage {
    async fn upsert(&self, record: &AuthorizationRecord) -> AuthResult<()> {
        let mut inner = self.write()?;

        for (kind, slot) in record.slots() {
            if let Some(owner) = inner
                .indexes
                .get(&kind)
                .and_then(|index| index.get(&slot.value))
                && owner != &record.id
            {
                tracing::debug!(
                    grant_id = %record.id,
                    kind = %kind,
                    token_prefix = %redact_token(&slot.value),
                    "Token value already indexed under another authorization"
                );
                return Err(AuthError::conflict(&record.id, kind, &slot.value));
            }
        }

        inner.remove(&record.id);
        for (kind, slot) in record.slots() {
            inner
                .indexes
                .entry(kind)
                .or_default()
                .insert(slot.value.clone(), record.id.clone());
        }
        inner.records.insert(record.id.clone(), record.clone());

        Ok(())
    }

    async fn delete(&self, id: &str) -> AuthResult<()> {
        self.write()?.remove(id);
        Ok(())
    }

    async fn delete_by_client(&self, registered_client_id: &str) -> AuthResult<u64> {
        let mut inner = self.write()?;
        let ids: Vec<String> = inner
            .records
            .values()
            .filter(|r| r.registered_client_id == registered_client_id)
            .map(|r| r.id.clone())
            .collect();
        for id in &ids {
            inner.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn find_by_id(&self, id: &str) -> AuthResult<Option<AuthorizationRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    async fn find_by_index(
        &self,
        index: TokenIndex,
        value: &str,
    ) -> AuthResult<Option<AuthorizationRecord>> {
        let inner = self.read()?;
        let found = match index {
            TokenIndex::State => inner
                .records
                .values()
                .find(|r| r.state.as_deref() == Some(value)),
            TokenIndex::Token(kind) => inner
                .indexes
                .get(&kind)
                .and_then(|index| index.get(value))
                .and_then(|id| inner.records.get(id)),
        };
        Ok(found.cloned())
    }

    async fn find_expired(
        &self,
        kind: TokenKind,
        as_of: OffsetDateTime,
    ) -> AuthResult<Vec<AuthorizationRecord>> {
        let inner = self.read()?;
        let mut expired: Vec<AuthorizationRecord> = inner
            .records
            .values()
            .filter(|r| r.slot(kind).is_some_and(|slot| slot.is_expired(as_of)))
            .cloned()
            .collect();
        expired.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(expired)
    }

    async fn delete_expired(&self, as_of: OffsetDateTime) -> AuthResult<u64> {
        let mut inner = self.write()?;
        let ids: Vec<String> = inner
            .records
            .values()
            .filter(|r| r.has_expired_slot(as_of))
            .map(|r| r.id.clone())
            .collect();
        for id in &ids {
            inner.remove(id);
        }
        Ok(ids.len() as u64)
    }
}
