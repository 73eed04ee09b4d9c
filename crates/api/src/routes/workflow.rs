//! Route definitions for workflow templates and instances.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workflow;
use crate::state::AppState;

/// Workflow routes mounted at `/workflow`.
///
/// ```text
/// GET  /templates                  -> list_templates
/// POST /templates                  -> create_template (admin)
/// GET  /templates/{id}             -> get_template
/// POST /templates/{id}/activate    -> activate_template (admin)
/// GET  /instances                  -> list_instances
/// POST /instances                  -> create_instance (editor/admin)
/// GET  /instances/{id}             -> get_instance
/// GET  /instances/{id}/history     -> instance_history
/// POST /instances/{id}/decision    -> decision (editor/admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/templates",
            get(workflow::list_templates).post(workflow::create_template),
        )
        .route("/templates/{id}", get(workflow::get_template))
        .route("/templates/{id}/activate", post(workflow::activate_template))
        .route(
            "/instances",
            get(workflow::list_instances).post(workflow::create_instance),
        )
        .route("/instances/{id}", get(workflow::get_instance))
        .route("/instances/{id}/history", get(workflow::instance_history))
        .route("/instances/{id}/decision", post(workflow::decision))
}

/// Batch-trigger routes mounted at `/admin/workflow`.
///
/// ```text
/// POST /run-rules          -> run_rules
/// POST /scan-escalations   -> scan_escalations (?dry_run)
/// ```
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/run-rules", post(workflow::run_rules))
        .route("/scan-escalations", post(workflow::scan_escalations))
}
