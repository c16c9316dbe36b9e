//! The per-user default bucket.

use crate::services::object_store::{StorageError, StorageResult};
use std::fmt;

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const DEFAULT_BUCKET_SUFFIX: &str = "-default-bucket";

/// A bucket name that satisfies S3 naming rules.
///
/// Every login owns exactly one bucket, `<login>-default-bucket`, created by
/// the control plane when the account is provisioned. The gateway never
/// creates buckets itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketName(String);

impl BucketName {
    /// Derive the default bucket for `login`, rejecting logins that cannot
    /// produce a valid bucket name.
    pub fn for_login(login: &str) -> StorageResult<Self> {
        Self::parse(format!("{}{}", login, DEFAULT_BUCKET_SUFFIX))
    }

    /// Validate bucket name format.
    ///
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    pub fn parse(name: impl Into<String>) -> StorageResult<Self> {
        let name = name.into();
        let invalid = |reason: &str| StorageError::InvalidBucketName {
            name: name.clone(),
            reason: reason.to_string(),
        };

        let len = name.len();
        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
            return Err(invalid("must be between 3 and 63 characters"));
        }

        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            ));
        }

        if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }

        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return Err(invalid(
                "cannot contain consecutive dots or dot-hyphen combinations",
            ));
        }

        if is_ipv4_like(&name) {
            return Err(invalid("must not be formatted like an IP address"));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bucket_is_derived_from_login() {
        let bucket = BucketName::for_login("alice").expect("valid");
        assert_eq!(bucket.as_str(), "alice-default-bucket");
    }

    #[test]
    fn logins_outside_bucket_rules_are_rejected() {
        for login in ["Alice", "bob_smith", "../etc", "a b", ".dot", "x".repeat(60).as_str()] {
            assert!(
                matches!(
                    BucketName::for_login(login),
                    Err(StorageError::InvalidBucketName { .. })
                ),
                "login {login:?} should be rejected"
            );
        }
    }

    #[test]
    fn ip_shaped_names_are_rejected() {
        assert!(BucketName::parse("192.168.1.10").is_err());
        assert!(BucketName::parse("192.168.1.bucket").is_ok());
    }
}
