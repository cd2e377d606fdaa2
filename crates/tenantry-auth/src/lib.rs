//! # tenantry-auth
//!
//! Persistence layer for OAuth 2.0 / OpenID Connect authorizations.
//!
//! This crate provides:
//! - A rich [`Grant`] model holding every token issued for one authorization
//! - A tagged value codec for attributes, token metadata and ID token claims
//! - Mapping between grants and flat [`AuthorizationRecord`]s
//! - Storage traits plus an in-memory backing
//! - An [`AuthorizationStore`] that finds a grant from any token value
//! - An [`ExpirySweeper`] for removing expired authorizations
//!
//! ## Modules
//!
//! - [`types`] - Grants, tokens, grant types and client descriptors
//! - [`codec`] - Attribute map encoding
//! - [`resolver`] - Grant type and scope string resolution
//! - [`record`] - Flat persisted authorization shape
//! - [`mapper`] - Grant to record conversion and back
//! - [`storage`] - Storage traits and in-memory implementations
//! - [`store`] - Save, remove and lookup of grants
//! - [`sweeper`] - Expired authorization cleanup
//! - [`config`] - Store and sweeper configuration

pub mod codec;
pub mod config;
pub mod error;
pub mod mapper;
pub mod record;
pub mod resolver;
pub mod storage;
pub mod store;
pub mod sweeper;
pub mod types;

pub use codec::{AttributeValue, Attributes};
pub use config::{AuthStoreConfig, ConfigError, SweeperConfig};
pub use error::{AuthError, ErrorCategory};
pub use mapper::AuthorizationMapper;
pub use record::{AuthorizationRecord, StoredToken};
pub use storage::{
    AuthorizationRecordStorage, ClientLookup, InMemoryAuthorizationStorage,
    InMemoryClientRegistry, TokenIndex,
};
pub use store::AuthorizationStore;
pub use sweeper::ExpirySweeper;
pub use types::{
    AccessTokenType, AuthorizationGrantType, ClientDescriptor, Grant, GrantBuilder, Token,
    TokenKind, TokenSlot,
};

/// Type alias for authorization store results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tenantry_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::codec::{AttributeValue, Attributes};
    pub use crate::config::{AuthStoreConfig, ConfigError, SweeperConfig};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::record::{AuthorizationRecord, StoredToken};
    pub use crate::storage::{AuthorizationRecordStorage, ClientLookup, TokenIndex};
    pub use crate::store::AuthorizationStore;
    pub use crate::sweeper::ExpirySweeper;
    pub use crate::types::{
        AccessTokenType, AuthorizationGrantType, ClientDescriptor, Grant, Token, TokenKind,
        TokenSlot,
    };
}
