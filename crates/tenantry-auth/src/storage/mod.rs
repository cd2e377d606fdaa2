//! Storage traits for authorization data.
//!
//! This module defines storage interfaces for:
//!
//! - Flat authorization records with one value index per token kind
//! - Registered client lookup
//!
//! # Implementations
//!
//! - [`InMemoryAuthorizationStorage`] / [`InMemoryClientRegistry`] - in this crate
//! - `tenantry-auth-postgres` - PostgreSQL storage backend

pub mod authorization;
pub mod client;
pub mod memory;

pub use authorization::{AuthorizationRecordStorage, TokenIndex};
pub use client::{ClientLookup, InMemoryClientRegistry};
pub use memory::InMemoryAuthorizationStorage;
