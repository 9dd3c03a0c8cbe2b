//! Email address helpers.
//!
//! Corporations are identified by the domain of their administrator's
//! email address. Employees belong to a corporation when their email
//! shares that domain.

use crate::error::{ClaError, ClaResult};

/// Derive the corporation identity key from an email address.
///
/// The key is the lower-cased domain part. Fails with
/// [`ClaError::InvalidParameter`] if the address has no local part or
/// no domain.
pub fn corp_identity_key(email: &str) -> ClaResult<String> {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(domain.to_ascii_lowercase())
        }
        _ => Err(ClaError::invalid(format!("malformed email address: {email}"))),
    }
}

/// Normalize an email for comparison and storage.
pub fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Whether two addresses belong to the same corporation.
pub fn is_same_corporation(a: &str, b: &str) -> bool {
    match (corp_identity_key(a), corp_identity_key(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}
