//! Grant type and scope normalization.
//!
//! Stored records carry grant types and scope sets as plain strings; these
//! functions turn them back into domain values and back again.

use std::collections::BTreeSet;

use crate::types::AuthorizationGrantType;
use crate::{AuthError, AuthResult};

/// Default delimiter for persisted scope sets.
pub const DEFAULT_SCOPE_DELIMITER: &str = ",";

/// Resolves a `grant_type` string to its canonical value.
///
/// `authorization_code`, `client_credentials` and `refresh_token` map to
/// their constants; any other non-blank string becomes an extension grant
/// type carrying that exact string.
///
/// # Errors
///
/// Returns `InvalidRecord` for a blank string.
pub fn resolve_grant_type(value: &str) -> AuthResult<AuthorizationGrantType> {
    match value {
        "authorization_code" => Ok(AuthorizationGrantType::AuthorizationCode),
        "client_credentials" => Ok(AuthorizationGrantType::ClientCredentials),
        "refresh_token" => Ok(AuthorizationGrantType::RefreshToken),
        other if other.trim().is_empty() => Err(AuthError::invalid_record(
            "",
            "authorization_grant_type cannot be blank",
        )),
        other => Ok(AuthorizationGrantType::Extension(other.to_string())),
    }
}

/// Parses a delimited scope string into a set.
///
/// Blank or absent input yields an empty set. Entries are trimmed, empty
/// entries dropped and duplicates collapsed.
#[must_use]
pub fn resolve_scopes(value: Option<&str>, delimiter: &str) -> BTreeSet<String> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return BTreeSet::new();
    };

    value
        .split(delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins a scope set for persistence. An empty set yields `None`.
#[must_use]
pub fn join_scopes(scopes: &BTreeSet<String>, delimiter: &str) -> Option<String> {
    if scopes.is_empty() {
        return None;
    }
    Some(
        scopes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(delimiter),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_grant_types() {
        assert_eq!(
            resolve_grant_type("authorization_code").unwrap(),
            AuthorizationGrantType::AuthorizationCode
        );
        assert_eq!(
            resolve_grant_type("client_credentials").unwrap(),
            AuthorizationGrantType::ClientCredentials
        );
        assert_eq!(
            resolve_grant_type("refresh_token").unwrap(),
            AuthorizationGrantType::RefreshToken
        );
    }

    #[test]
    fn test_extension_grant_type_keeps_exact_string() {
        let grant_type = resolve_grant_type("urn:custom:x").unwrap();
        assert!(grant_type.is_extension());
        assert_eq!(grant_type.as_str(), "urn:custom:x");
        assert_eq!(grant_type.to_string(), "urn:custom:x");

        let device = resolve_grant_type(AuthorizationGrantType::DEVICE_CODE).unwrap();
        assert_eq!(
            device,
            AuthorizationGrantType::Extension(AuthorizationGrantType::DEVICE_CODE.to_string())
        );
    }

    #[test]
    fn test_grant_type_matching_is_exact() {
        let grant_type = resolve_grant_type("Authorization_Code").unwrap();
        assert!(grant_type.is_extension());
    }

    #[test]
    fn test_blank_grant_type_rejected() {
        assert!(resolve_grant_type("").is_err());
        assert!(resolve_grant_type("   ").is_err());
    }

    #[test]
    fn test_resolve_scopes() {
        assert!(resolve_scopes(None, ",").is_empty());
        assert!(resolve_scopes(Some(""), ",").is_empty());
        assert!(resolve_scopes(Some("  "), ",").is_empty());

        let scopes = resolve_scopes(Some("openid, profile,,email,openid "), ",");
        let expected: BTreeSet<String> = ["email", "openid", "profile"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(scopes, expected);
    }

    #[test]
    fn test_join_scopes() {
        let scopes = resolve_scopes(Some("read,write"), ",");
        assert_eq!(join_scopes(&scopes, ",").as_deref(), Some("read,write"));
        assert_eq!(join_scopes(&BTreeSet::new(), ","), None);

        let joined = join_scopes(&scopes, " ").unwrap();
        assert_eq!(resolve_scopes(Some(&joined), " "), scopes);
    }
}
