//! Client lookup trait.
//!
//! Defines how the record mapper resolves the registered client an
//! authorization references. The registry is owned elsewhere; only lookup
//! is required here.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::AuthResult;
use crate::types::ClientDescriptor;

// =============================================================================
// Client Lookup Trait
// =============================================================================

/// Resolves registered client ids to their descriptors.
///
/// # Example
///
/// ```ignore
/// use tenantry_auth::storage::ClientLookup;
///
/// async fn example(lookup: &dyn ClientLookup) -> tenantry_auth::AuthResult<()> {
///     if let Some(client) = lookup.find_client("billing-portal").await? {
///         println!("Found client: {}", client.client_name);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ClientLookup: Send + Sync {
    /// Find a client by its registration id.
    ///
    /// Returns `None` if the client does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be reached.
    async fn find_client(&self, id: &str) -> AuthResult<Option<ClientDescriptor>>;
}

// =============================================================================
// In-Memory Registry
// =============================================================================

/// Concurrent in-memory client registry.
///
/// Suitable for tests and for deployments that load clients from static
/// configuration.
#[derive(Debug, Default)]
pub struct InMemoryClientRegistry {
    clients: DashMap<String, ClientDescriptor>,
}

impl InMemoryClientRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the given clients.
    #[must_use]
    pub fn with_clients(clients: impl IntoIterator<Item = ClientDescriptor>) -> Self {
        let registry = Self::new();
        for client in clients {
            registry.register(client);
        }
        registry
    }

    /// Register or replace a client.
    pub fn register(&self, client: ClientDescriptor) {
        self.clients.insert(client.id.clone(), client);
    }

    /// Remove a client. Returns `true` if it existed.
    pub fn unregister(&self, id: &str) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if no clients are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientLookup for InMemoryClientRegistry {
    async fn find_client(&self, id: &str) -> AuthResult<Option<ClientDescriptor>> {
        Ok(self.clients.get(id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_find() {
        let registry = InMemoryClientRegistry::with_clients([ClientDescriptor::new(
            "billing-portal",
            "Billing Portal",
        )]);
        assert_eq!(registry.len(), 1);

        let found = registry.find_client("billing-portal").await.unwrap();
        assert_eq!(found.unwrap().client_name, "Billing Portal");
        assert!(registry.find_client("missing").await.unwrap().is_none());

        assert!(registry.unregister("billing-portal"));
        assert!(!registry.unregister("billing-portal"));
        assert!(registry.is_empty());
    }
}
