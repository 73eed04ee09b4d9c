//! Request classification for the audit trail.
//!
//! The ingestion middleware funnels every completed HTTP exchange through
//! [`classify`]. The policy is an explicit ordered list of named
//! (predicate, action) rules evaluated top-down with first match winning,
//! so it can be audited and unit-tested without a running server.

use crate::action::ActionKind;

/// Path suffix identifying the login endpoint.
pub const LOGIN_PATH_SUFFIX: &str = "/auth/login";

/// Path prefix identifying the admin panel.
pub const ADMIN_PATH_PREFIX: &str = "/api/v1/admin";

/// Path segment identifying file downloads.
pub const DOWNLOAD_SEGMENT: &str = "/download";

/// A completed HTTP exchange, as seen by the audit middleware.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub status: u16,
}

impl Exchange<'_> {
    fn is_mutation(&self) -> bool {
        matches!(self.method, "POST" | "PUT" | "PATCH" | "DELETE")
    }

    fn is_read(&self) -> bool {
        matches!(self.method, "GET" | "HEAD")
    }
}

/// One classification rule.
pub struct Rule {
    pub name: &'static str,
    applies: fn(&Exchange) -> bool,
    pub action: ActionKind,
}

fn failed_login(ex: &Exchange) -> bool {
    ex.path.ends_with(LOGIN_PATH_SUFFIX)
        && ex.is_mutation()
        && matches!(ex.status, 400 | 401 | 403)
}

fn permission_denied(ex: &Exchange) -> bool {
    matches!(ex.status, 401 | 403)
}

fn file_download(ex: &Exchange) -> bool {
    ex.path.contains(DOWNLOAD_SEGMENT) && ex.status == 200
}

fn admin_view(ex: &Exchange) -> bool {
    ex.path.starts_with(ADMIN_PATH_PREFIX) && ex.is_read()
}

/// The rule chain, in priority order. A failed login is also a 401/403, so
/// its rule must sit above the generic permission check.
pub static RULES: [Rule; 4] = [
    Rule {
        name: "failed_login",
        applies: failed_login,
        action: ActionKind::LoginFailed,
    },
    Rule {
        name: "permission_denied",
        applies: permission_denied,
        action: ActionKind::PermissionDenied,
    },
    Rule {
        name: "file_download",
        applies: file_download,
        action: ActionKind::FileDownload,
    },
    Rule {
        name: "admin_view",
        applies: admin_view,
        action: ActionKind::View,
    },
];

/// Classify an exchange, returning the action to log or `None` when the
/// exchange is not loggable.
pub fn classify(exchange: &Exchange) -> Option<ActionKind> {
    RULES.iter().find(|rule| (rule.applies)(exchange)).map(|rule| rule.action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(method: &'static str, path: &'static str, status: u16) -> Exchange<'static> {
        Exchange { method, path, status }
    }

    #[test]
    fn failed_login_beats_permission_denied() {
        let ex = exchange("POST", "/api/v1/auth/login", 401);
        assert_eq!(classify(&ex), Some(ActionKind::LoginFailed));
    }

    #[test]
    fn failed_login_matches_bad_request_status() {
        let ex = exchange("POST", "/api/v1/auth/login", 400);
        assert_eq!(classify(&ex), Some(ActionKind::LoginFailed));
    }

    #[test]
    fn successful_login_is_not_classified() {
        // Login success is logged by the auth handler itself, not inferred
        // from the response.
        let ex = exchange("POST", "/api/v1/auth/login", 200);
        assert_eq!(classify(&ex), None);
    }

    #[test]
    fn get_on_login_path_is_not_a_failed_login() {
        let ex = exchange("GET", "/api/v1/auth/login", 400);
        assert_eq!(classify(&ex), None);
    }

    #[test]
    fn any_denied_response_is_permission_denied() {
        let ex = exchange("GET", "/api/v1/workflow/templates", 403);
        assert_eq!(classify(&ex), Some(ActionKind::PermissionDenied));
        let ex = exchange("DELETE", "/api/v1/transactions/9", 401);
        assert_eq!(classify(&ex), Some(ActionKind::PermissionDenied));
    }

    #[test]
    fn download_requires_success_status() {
        let ok = exchange("GET", "/api/v1/attachments/3/download", 200);
        assert_eq!(classify(&ok), Some(ActionKind::FileDownload));
        // A denied download falls through to the permission rule.
        let denied = exchange("GET", "/api/v1/attachments/3/download", 403);
        assert_eq!(classify(&denied), Some(ActionKind::PermissionDenied));
        let missing = exchange("GET", "/api/v1/attachments/3/download", 404);
        assert_eq!(classify(&missing), None);
    }

    #[test]
    fn admin_reads_are_views() {
        let ex = exchange("GET", "/api/v1/admin/users", 200);
        assert_eq!(classify(&ex), Some(ActionKind::View));
        let ex = exchange("HEAD", "/api/v1/admin/users", 200);
        assert_eq!(classify(&ex), Some(ActionKind::View));
    }

    #[test]
    fn admin_mutations_are_not_views() {
        let ex = exchange("POST", "/api/v1/admin/users", 201);
        assert_eq!(classify(&ex), None);
    }

    #[test]
    fn ordinary_traffic_is_not_logged() {
        assert_eq!(classify(&exchange("GET", "/api/v1/audit/logs", 200)), None);
        assert_eq!(classify(&exchange("POST", "/api/v1/workflow/instances", 201)), None);
        assert_eq!(classify(&exchange("GET", "/health", 200)), None);
    }

    #[test]
    fn rule_order_is_stable() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            ["failed_login", "permission_denied", "file_download", "admin_view"]
        );
    }
}
