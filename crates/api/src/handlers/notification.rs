//! Handlers for the authenticated user's notification inbox.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mdc_core::error::CoreError;
use mdc_core::types::DbId;
use mdc_db::models::notification::Notification;
use mdc_db::repositories::NotificationRepo;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Hard cap on notification page size.
const MAX_LIMIT: i64 = 100;

/// Default notification page size.
const DEFAULT_LIMIT: i64 = 50;

/// Query parameters for `GET /notifications`.
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/v1/notifications
///
/// List the caller's notifications, newest first.
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<NotificationQuery>,
) -> AppResult<Json<DataResponse<Vec<Notification>>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let notifications = NotificationRepo::list_for_user(
        &state.pool,
        auth.user_id,
        params.unread_only,
        limit,
        offset,
    )
    .await?;

    Ok(Json(DataResponse { data: notifications }))
}

/// POST /api/v1/notifications/{id}/read
///
/// Mark one of the caller's notifications read. Responds 404 for rows the
/// caller does not own, so ids cannot be probed.
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let updated = NotificationRepo::mark_read(&state.pool, id, auth.user_id).await?;
    if !updated {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Notification",
            id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let marked = NotificationRepo::mark_all_read(&state.pool, auth.user_id).await?;
    Ok(Json(json!({ "data": { "marked_read": marked } })))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let count = NotificationRepo::unread_count(&state.pool, auth.user_id).await?;
    Ok(Json(json!({ "data": { "count": count } })))
}
