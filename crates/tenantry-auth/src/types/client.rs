//! Registered client descriptor.
//!
//! The client registry itself lives outside this crate; the store only needs
//! to know whether a referenced client still exists and what it is called.

use std::collections::BTreeSet;

use super::grant_type::AuthorizationGrantType;

/// Minimal view of a registered OAuth 2.0 client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDescriptor {
    /// Internal registration id (what authorizations reference).
    pub id: String,
    /// Public OAuth `client_id`.
    pub client_id: String,
    /// Human-readable display name.
    pub client_name: String,
    /// Grant types the client may use.
    pub grant_types: Vec<AuthorizationGrantType>,
    /// Scopes the client may request.
    pub scopes: BTreeSet<String>,
}

impl ClientDescriptor {
    /// Creates a descriptor whose internal id equals its `client_id`.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_name: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            id: client_id.clone(),
            client_id,
            client_name: client_name.into(),
            grant_types: Vec::new(),
            scopes: BTreeSet::new(),
        }
    }

    /// Returns `true` if the client may use the grant type.
    #[must_use]
    pub fn supports_grant_type(&self, grant_type: &AuthorizationGrantType) -> bool {
        self.grant_types.contains(grant_type)
    }
}
