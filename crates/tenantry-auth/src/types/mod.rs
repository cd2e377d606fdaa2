//! Domain types for authorizations and their tokens.
//!
//! - [`Grant`] - One OAuth2/OIDC flow instance with its token slots
//! - [`TokenSlot`] / [`TokenKind`] - The six token kinds a grant may carry
//! - [`AuthorizationGrantType`] - Open set of grant types
//! - [`ClientDescriptor`] - View of a registered client

pub mod client;
pub mod grant;
pub mod grant_type;
pub mod token;

pub use client::ClientDescriptor;
pub use grant::{Grant, GrantBuilder, STATE_ATTRIBUTE};
pub use grant_type::AuthorizationGrantType;
pub use token::{AccessTokenType, INVALIDATED_METADATA_KEY, Token, TokenKind, TokenSlot};
