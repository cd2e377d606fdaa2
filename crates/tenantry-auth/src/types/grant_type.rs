//! OAuth 2.0 grant type values.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// OAuth 2.0 authorization grant type.
///
/// The protocol permits custom grant types (device code, token exchange, JWT
/// bearer and vendor URNs), so this is an open set: anything that is not one
/// of the well-known constants is carried verbatim as [`Extension`].
///
/// Equality, ordering and hashing go by the protocol string, so an
/// `Extension("refresh_token")` is the same grant type as `RefreshToken`.
/// [`crate::resolver::resolve_grant_type`] yields the canonical variant.
///
/// [`Extension`]: AuthorizationGrantType::Extension
#[derive(Debug, Clone)]
pub enum AuthorizationGrantType {
    /// Authorization Code flow.
    AuthorizationCode,
    /// Client Credentials flow.
    ClientCredentials,
    /// Refresh Token flow.
    RefreshToken,
    /// Any other grant type, carrying its exact protocol string.
    Extension(String),
}

impl AuthorizationGrantType {
    /// The device authorization grant (RFC 8628), an extension grant type.
    pub const DEVICE_CODE: &'static str = "urn:ietf:params:oauth:grant-type:device_code";

    /// Returns the OAuth 2.0 `grant_type` parameter value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
            Self::Extension(value) => value,
        }
    }

    /// Returns `true` for grant types outside the well-known constants.
    #[must_use]
    pub fn is_extension(&self) -> bool {
        matches!(self, Self::Extension(_))
    }
}

impl PartialEq for AuthorizationGrantType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for AuthorizationGrantType {}

impl Hash for AuthorizationGrantType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for AuthorizationGrantType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AuthorizationGrantType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Display for AuthorizationGrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_extension_spelling_of_known_type_is_equal() {
        let spelled = AuthorizationGrantType::Extension("refresh_token".to_string());
        assert_eq!(spelled, AuthorizationGrantType::RefreshToken);
        assert_eq!(spelled.cmp(&AuthorizationGrantType::RefreshToken), Ordering::Equal);

        let set: HashSet<_> = [spelled, AuthorizationGrantType::RefreshToken].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_distinct_extensions_differ() {
        let device = AuthorizationGrantType::Extension(AuthorizationGrantType::DEVICE_CODE.to_string());
        let exchange =
            AuthorizationGrantType::Extension("urn:ietf:params:oauth:grant-type:token-exchange".to_string());
        assert_ne!(device, exchange);
        assert_ne!(device, AuthorizationGrantType::AuthorizationCode);
    }
}
