//! Signing service configuration.

use cla_core::models::manager::ManagerRole;

/// Configuration for the signing service.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Number of digits in an email verification code (default: 6).
    pub verification_code_length: usize,
    /// Corporation managers with this role are told when an employee
    /// signs (default: `Manager`).
    pub employee_signing_recipients: ManagerRole,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            verification_code_length: 6,
            employee_signing_recipients: ManagerRole::Manager,
        }
    }
}
