//! Handlers for the `/audit/logs` resource: querying, statistics, export,
//! and retention cleanup.
//!
//! Role scoping happens here, not in the repository: admins see everything,
//! everyone else is pinned to their own records before the filter reaches
//! the database.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use mdc_core::action::ActionKind;
use mdc_core::error::CoreError;
use mdc_core::subject::SubjectKind;
use mdc_core::types::{DbId, Timestamp};
use mdc_db::models::event_record::{
    CreateEventRecord, EventRecordPage, EventRecordQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use mdc_db::repositories::{resolve_subject, EventRecordRepo, SubjectSummary};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::handlers::append_best_effort;
use crate::middleware::auth::{AuthUser, RequestMeta};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Query parameters shared by the list and statistics endpoints.
#[derive(Debug, Deserialize)]
pub struct AuditLogParams {
    /// Comma-separated action kinds; unknown kinds are rejected.
    pub action: Option<String>,
    /// Admin only: restrict to one actor.
    pub actor_id: Option<DbId>,
    /// Substring match on the subject table name.
    pub subject_table: Option<String>,
    /// Exact match on the recorded client IP.
    pub ip_address: Option<String>,
    /// RFC 3339 lower bound (inclusive).
    pub from: Option<Timestamp>,
    /// RFC 3339 upper bound (inclusive).
    pub to: Option<Timestamp>,
    /// Case-insensitive search over description, subject table, actor
    /// email, and IP.
    pub search: Option<String>,
    /// Restrict to the security-relevant action kinds.
    #[serde(default)]
    pub security_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request body for `POST /audit/logs/cleanup`.
#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    pub days: i64,
}

/// Query parameters for `GET /audit/logs/export`.
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
}

/// Detail payload: the record plus its resolved subject.
#[derive(Debug, Serialize)]
pub struct AuditLogDetail {
    #[serde(flatten)]
    pub record: mdc_db::models::event_record::EventRecordWithActor,
    /// `None` when the subject row no longer exists or the record has no
    /// resolvable subject.
    pub subject: Option<SubjectSummary>,
}

// ---------------------------------------------------------------------------
// Filter assembly
// ---------------------------------------------------------------------------

/// Translate the query string into a repository filter, enforcing role
/// scoping on `actor_id`.
fn build_filter(auth: &AuthUser, params: &AuditLogParams) -> AppResult<EventRecordQuery> {
    let mut actions = Vec::new();
    if let Some(raw) = params.action.as_deref() {
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let kind = ActionKind::parse(part)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown action kind: {part}")))?;
            actions.push(kind);
        }
    }

    // Non-admins only ever see their own trail; naming another actor is a
    // permission error, not an empty result.
    let actor_id = if auth.is_admin() {
        params.actor_id
    } else {
        match params.actor_id {
            Some(requested) if requested != auth.user_id => {
                return Err(AppError::Core(CoreError::Forbidden(
                    "Only admins may query other users' audit records".into(),
                )));
            }
            _ => Some(auth.user_id),
        }
    };

    Ok(EventRecordQuery {
        actions,
        actor_id,
        subject_table: params.subject_table.clone(),
        ip_address: params.ip_address.clone(),
        from: params.from,
        to: params.to,
        search: params.search.clone(),
        security_only: params.security_only,
        limit: params.limit,
        offset: params.offset,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/audit/logs
///
/// Filtered, paginated audit log listing, newest first.
pub async fn list_logs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<AuditLogParams>,
) -> AppResult<Json<DataResponse<EventRecordPage>>> {
    let filter = build_filter(&auth, &params)?;

    let items = EventRecordRepo::query(&state.pool, &filter).await?;
    let total = EventRecordRepo::count(&state.pool, &filter).await?;

    // Echo the bounds the repository actually applied.
    let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = filter.offset.unwrap_or(0).max(0);

    Ok(Json(DataResponse {
        data: EventRecordPage { items, total, limit, offset },
    }))
}

/// GET /api/v1/audit/logs/statistics
///
/// Point-in-time dashboard statistics over the caller's visible records.
pub async fn statistics(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<AuditLogParams>,
) -> AppResult<Json<DataResponse<mdc_db::models::event_record::StatisticsReport>>> {
    let filter = build_filter(&auth, &params)?;
    let report = EventRecordRepo::statistics(&state.pool, &filter, Utc::now()).await?;
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/audit/logs/{id}
///
/// Single-record detail with the subject resolved through the registry.
/// Non-admins get 404 for records that are not their own, indistinguishable
/// from records that do not exist.
pub async fn get_log(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<AuditLogDetail>>> {
    let record = EventRecordRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Audit record", id }))?;

    if !auth.is_admin() && record.actor_id != Some(auth.user_id) {
        return Err(AppError::Core(CoreError::NotFound { entity: "Audit record", id }));
    }

    let subject = match (SubjectKind::from_table_name(&record.subject_table), record.subject_id) {
        (Some(kind), Some(subject_id)) => resolve_subject(&state.pool, kind, subject_id).await?,
        _ => None,
    };

    Ok(Json(DataResponse { data: AuditLogDetail { record, subject } }))
}

/// POST /api/v1/audit/logs/cleanup
///
/// Admin-triggered retention purge. The 30-day floor is a compliance
/// requirement, reported as a field-level validation error.
pub async fn cleanup(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppJson(input): AppJson<CleanupRequest>,
) -> AppResult<Json<DataResponse<mdc_jobs::purge::PurgeReport>>> {
    if input.days < mdc_jobs::purge::MIN_RETENTION_DAYS {
        return Err(AppError::field(
            "Retention period too short",
            "days",
            format!(
                "must be at least {} days",
                mdc_jobs::purge::MIN_RETENTION_DAYS
            ),
        ));
    }

    let report = mdc_jobs::purge::run(&state.pool, input.days, Some(admin.user_id)).await?;
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/audit/logs/export
///
/// Stream the filtered records as a CSV attachment, oldest first. Only CSV
/// is implemented; requests for other formats are declined.
pub async fn export(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    meta: RequestMeta,
    Query(params): Query<ExportParams>,
) -> AppResult<impl IntoResponse> {
    match params.format.as_deref() {
        None | Some("csv") => {}
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "Unsupported export format '{other}'; only csv is available"
            )));
        }
    }

    let records = EventRecordRepo::export_range(&state.pool, params.from, params.to).await?;
    let csv = render_csv(&records);

    append_best_effort(
        &state.pool,
        CreateEventRecord::new(ActionKind::Export)
            .with_actor(admin.user_id)
            .with_session(admin.session_id)
            .with_subject_kind(SubjectKind::EventRecord)
            .with_description(format!("exported {} audit records as csv", records.len()))
            .with_client(meta.ip_address, meta.user_agent),
    )
    .await;

    let filename = format!("audit-logs-{}.csv", Utc::now().format("%Y%m%d%H%M%S"));
    Ok(axum::response::Response::builder()
        .status(200)
        .header("Content-Type", "text/csv")
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        )
        .body(axum::body::Body::from(csv))
        .map_err(|e| AppError::InternalError(format!("Export response error: {e}")))?)
}

// ---------------------------------------------------------------------------
// CSV rendering
// ---------------------------------------------------------------------------

fn render_csv(records: &[mdc_db::models::event_record::EventRecordWithActor]) -> String {
    let mut out = String::from(
        "id,created_at,action,actor_id,actor_email,subject_table,subject_id,description,ip_address,session_id\n",
    );
    for r in records {
        let row = [
            r.id.to_string(),
            r.created_at.to_rfc3339(),
            r.action.clone(),
            r.actor_id.map_or(String::new(), |id| id.to_string()),
            r.actor_email.clone().unwrap_or_default(),
            r.subject_table.clone(),
            r.subject_id.map_or(String::new(), |id| id.to_string()),
            r.description.clone(),
            r.ip_address.clone().unwrap_or_default(),
            r.session_id.clone().unwrap_or_default(),
        ];
        let line: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
