//! Admin-only user management handlers.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mdc_core::action::ActionKind;
use mdc_core::error::CoreError;
use mdc_core::subject::SubjectKind;
use mdc_core::types::DbId;
use mdc_db::models::event_record::CreateEventRecord;
use mdc_db::models::user::UserResponse;
use mdc_db::repositories::{RoleRepo, SessionRepo, UserRepo};
use serde::Deserialize;

use crate::auth::password::{hash_password, validate_password_strength, MIN_PASSWORD_LENGTH};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::handlers::append_best_effort;
use crate::handlers::auth::build_user_response;
use crate::middleware::auth::RequestMeta;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /admin/users/{id}/reset-password`.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// GET /api/v1/admin/users
///
/// List every user with their resolved role name.
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let users = UserRepo::list(&state.pool).await?;

    // Resolve roles in one query instead of one lookup per user.
    let roles: HashMap<DbId, String> = RoleRepo::list(&state.pool)
        .await?
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();

    let data = users
        .iter()
        .map(|u| {
            let role = roles
                .get(&u.role_id)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            build_user_response(u, role)
        })
        .collect();

    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/admin/users/{id}/reset-password
///
/// Set a new password for the given user and revoke their sessions.
pub async fn reset_password(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    meta: RequestMeta,
    Path(user_id): Path<DbId>,
    AppJson(input): AppJson<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    validate_password_strength(&input.new_password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::field("Password too weak", "new_password", msg))?;

    let user = UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }))?;

    let hashed = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    UserRepo::update_password(&state.pool, user.id, &hashed).await?;
    SessionRepo::revoke_all_for_user(&state.pool, user.id).await?;

    append_best_effort(
        &state.pool,
        CreateEventRecord::new(ActionKind::PasswordReset)
            .with_actor(admin.user_id)
            .with_session(admin.session_id)
            .with_subject(SubjectKind::User, user.id)
            .with_description(format!("admin reset password for user {}", user.username))
            .with_client(meta.ip_address, meta.user_agent),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
