//! Audit action kinds.
//!
//! The set is closed: `event_records.action` carries a CHECK constraint over
//! exactly these values, so an unknown kind can never reach the table.
//! Handlers and batch jobs always go through [`ActionKind`]; the raw string
//! form exists only at the storage and query-parameter boundaries.

use serde::{Deserialize, Serialize};

/// One loggable action, stored in its snake_case form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    View,
    Login,
    Logout,
    LoginFailed,
    PermissionDenied,
    PasswordChange,
    PasswordReset,
    FileUpload,
    FileDownload,
    Export,
    Approve,
    Reject,
    Escalate,
}

impl ActionKind {
    /// Every kind, in declaration order. Must stay in sync with the
    /// `ck_event_records_action` constraint in the migrations.
    pub const ALL: [ActionKind; 16] = [
        ActionKind::Create,
        ActionKind::Update,
        ActionKind::Delete,
        ActionKind::View,
        ActionKind::Login,
        ActionKind::Logout,
        ActionKind::LoginFailed,
        ActionKind::PermissionDenied,
        ActionKind::PasswordChange,
        ActionKind::PasswordReset,
        ActionKind::FileUpload,
        ActionKind::FileDownload,
        ActionKind::Export,
        ActionKind::Approve,
        ActionKind::Reject,
        ActionKind::Escalate,
    ];

    /// Kinds matched by the security-relevant filter.
    pub const SECURITY_RELEVANT: [ActionKind; 5] = [
        ActionKind::LoginFailed,
        ActionKind::PermissionDenied,
        ActionKind::PasswordChange,
        ActionKind::PasswordReset,
        ActionKind::Delete,
    ];

    /// Kinds counted as security alerts in the statistics window.
    pub const ALERT_KINDS: [ActionKind; 3] = [
        ActionKind::LoginFailed,
        ActionKind::PermissionDenied,
        ActionKind::Delete,
    ];

    /// Kinds counted as errors for the system-health label.
    pub const ERROR_KINDS: [ActionKind; 2] =
        [ActionKind::LoginFailed, ActionKind::PermissionDenied];

    /// Storage form of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::View => "view",
            ActionKind::Login => "login",
            ActionKind::Logout => "logout",
            ActionKind::LoginFailed => "login_failed",
            ActionKind::PermissionDenied => "permission_denied",
            ActionKind::PasswordChange => "password_change",
            ActionKind::PasswordReset => "password_reset",
            ActionKind::FileUpload => "file_upload",
            ActionKind::FileDownload => "file_download",
            ActionKind::Export => "export",
            ActionKind::Approve => "approve",
            ActionKind::Reject => "reject",
            ActionKind::Escalate => "escalate",
        }
    }

    /// Parse the storage form back into a kind.
    pub fn parse(value: &str) -> Option<ActionKind> {
        ActionKind::ALL.iter().copied().find(|k| k.as_str() == value)
    }

    pub fn is_security_relevant(self) -> bool {
        ActionKind::SECURITY_RELEVANT.contains(&self)
    }

    /// Mutation kinds are the only ones that may carry before/after
    /// state snapshots.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            ActionKind::Create
                | ActionKind::Update
                | ActionKind::Delete
                | ActionKind::Approve
                | ActionKind::Reject
        )
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health label derived from the count of authentication/authorization
/// errors over the last 24 hours.
pub fn system_health(error_count: i64) -> &'static str {
    match error_count {
        0 => "excellent",
        1..=9 => "good",
        10..=49 => "warning",
        _ => "critical",
    }
}
