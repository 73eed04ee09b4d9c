//! Route definitions for the audit record API.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::audit;
use crate::state::AppState;

/// Audit routes mounted at `/audit/logs`.
///
/// Queries are open to any authenticated user (scoped to their own records
/// unless they are an admin); export and cleanup are admin only.
///
/// ```text
/// GET  /             -> list_logs
/// GET  /statistics   -> statistics
/// GET  /export       -> export
/// POST /cleanup      -> cleanup
/// GET  /{id}         -> get_log
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(audit::list_logs))
        .route("/statistics", get(audit::statistics))
        .route("/export", get(audit::export))
        .route("/cleanup", post(audit::cleanup))
        .route("/{id}", get(audit::get_log))
}
