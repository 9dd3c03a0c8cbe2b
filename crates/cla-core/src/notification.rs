//! Notification payloads handed to the delivery collaborator.
//!
//! Rendering and delivery happen outside this system. Each variant
//! carries what its template needs; the sink decides how to render it.

use serde::Serialize;

use crate::error::ClaResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    CorporationSigned {
        corporation_name: String,
        admin_name: String,
    },
    IndividualSigned {
        name: String,
    },
    EmployeeSigned {
        employee_email: String,
    },
    EmployeeActivated,
    EmployeeDeactivated,
    EmployeeRemoved,
    ManagerAdded {
        /// The corporation administrator rather than an employee manager.
        admin: bool,
    },
    ManagerRemoved,
    VerificationCode {
        code: String,
    },
}

impl Notification {
    /// Name of the template the sink should render.
    pub fn template(&self) -> &'static str {
        match self {
            Notification::CorporationSigned { .. } => "corporation signing",
            Notification::IndividualSigned { .. } => "individual signing",
            Notification::EmployeeSigned { .. } => "employee signing",
            Notification::EmployeeActivated => "activating employee",
            Notification::EmployeeDeactivated => "inactivating employee",
            Notification::EmployeeRemoved => "removing employee",
            Notification::ManagerAdded { admin: true } => "adding corp admin",
            Notification::ManagerAdded { admin: false } => "adding corp manager",
            Notification::ManagerRemoved => "removing corp manager",
            Notification::VerificationCode { .. } => "verification code",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Notification::CorporationSigned { .. } => "Corporation Signing",
            Notification::IndividualSigned { .. } => "Individual Signing",
            Notification::EmployeeSigned { .. } => "Employee Signing",
            Notification::EmployeeActivated => "Activate employee",
            Notification::EmployeeDeactivated => "Inactivate employee",
            Notification::EmployeeRemoved => "Remove employee",
            Notification::ManagerAdded { admin: true } => "Add corporation administrator",
            Notification::ManagerAdded { admin: false } => "Add employee manager",
            Notification::ManagerRemoved => "Remove employee manager",
            Notification::VerificationCode { .. } => "Verification code",
        }
    }
}

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    /// The org email of the binding the event happened under.
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub notification: Notification,
}

impl EmailMessage {
    pub fn new(from: impl Into<String>, to: Vec<String>, notification: Notification) -> Self {
        Self {
            from: from.into(),
            to,
            subject: notification.subject().to_string(),
            notification,
        }
    }
}

/// Delivery collaborator. Failures are reported but never undo the
/// write that triggered the notification.
pub trait NotificationSink: Send + Sync {
    fn send(&self, message: EmailMessage) -> impl Future<Output = ClaResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_added_selects_template_by_role() {
        assert_eq!(
            Notification::ManagerAdded { admin: true }.template(),
            "adding corp admin"
        );
        assert_eq!(
            Notification::ManagerAdded { admin: false }.template(),
            "adding corp manager"
        );
    }

    #[test]
    fn message_takes_subject_from_notification() {
        let msg = EmailMessage::new(
            "cla@acme.org",
            vec!["bob@corp.com".into()],
            Notification::EmployeeRemoved,
        );
        assert_eq!(msg.subject, "Remove employee");
        assert_eq!(msg.from, "cla@acme.org");
    }
}
