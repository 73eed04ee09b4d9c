pub mod admin;
pub mod audit;
pub mod auth;
pub mod health;
pub mod notification;
pub mod workflow;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/login                              login (public)
/// /auth/refresh                            refresh (public)
/// /auth/logout                             logout (requires auth)
/// /auth/change-password                    change own password
/// /auth/me                                 current user
///
/// /admin/users                             user list (admin only)
/// /admin/users/{id}/reset-password         reset password (POST)
/// /admin/workflow/run-rules                rule evaluation pass (POST)
/// /admin/workflow/scan-escalations         escalation scan (POST, ?dry_run)
///
/// /audit/logs                              query records (?action, actor_id, ...)
/// /audit/logs/statistics                   dashboard statistics
/// /audit/logs/export                       CSV export (admin only)
/// /audit/logs/cleanup                      retention purge (POST, admin only)
/// /audit/logs/{id}                         record detail with resolved subject
///
/// /workflow/templates                      list, create (create admin only)
/// /workflow/templates/{id}                 template with full graph
/// /workflow/templates/{id}/activate        re-validate and activate (POST)
/// /workflow/instances                      list (?status), start (POST)
/// /workflow/instances/{id}                 instance with current stage
/// /workflow/instances/{id}/history         stage history
/// /workflow/instances/{id}/decision        approve/reject (POST)
///
/// /notifications                           list (?unread_only, limit, offset)
/// /notifications/read-all                  mark all read (POST)
/// /notifications/unread-count              unread count (GET)
/// /notifications/{id}/read                 mark read (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication routes (login, refresh, logout, password, me).
        .nest("/auth", auth::router())
        // Admin routes (user management).
        .nest("/admin", admin::router())
        // Admin triggers for the batch entry points.
        .nest("/admin/workflow", workflow::admin_router())
        // Audit record query, statistics, export, cleanup.
        .nest("/audit/logs", audit::router())
        // Workflow templates, instances, decisions.
        .nest("/workflow", workflow::router())
        // Notification inbox.
        .nest("/notifications", notification::router())
}
