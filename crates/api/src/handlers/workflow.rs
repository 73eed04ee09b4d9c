//! Handlers for workflow templates, instances, and decisions, plus the
//! admin triggers for the batch entry points.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mdc_core::action::ActionKind;
use mdc_core::error::CoreError;
use mdc_core::subject::SubjectKind;
use mdc_core::types::DbId;
use mdc_core::workflow::{
    validate_graph, ConditionKind, StageDef, StageKind, StageOutcome, TransitionDef,
};
use mdc_db::models::event_record::CreateEventRecord;
use mdc_db::models::workflow::{
    CreateWorkflowStage, CreateWorkflowTemplate, CreateWorkflowTransition, StageHistoryEntry,
    StartInstance, InstanceWithStage, TemplateDetail, WorkflowInstance, WorkflowTemplate,
    INSTANCE_ACTIVE, INSTANCE_COMPLETED,
};
use mdc_db::repositories::{TransactionRepo, WorkflowInstanceRepo, WorkflowTemplateRepo};
use mdc_jobs::{escalation, rules};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::handlers::append_best_effort;
use crate::middleware::auth::{AuthUser, RequestMeta};
use crate::middleware::rbac::{RequireAdmin, RequireEditor};
use crate::response::DataResponse;
use crate::state::AppState;

/// Hard cap on instance listing page size.
const MAX_INSTANCE_PAGE: i64 = 200;

/// Default instance listing page size.
const DEFAULT_INSTANCE_PAGE: i64 = 50;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /workflow/templates`. Transitions reference
/// stages by their position in `stages`.
#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: i32,
    pub category: String,
    #[serde(default)]
    pub allow_parallel: bool,
    #[serde(default)]
    pub auto_assign: bool,
    pub stages: Vec<StageInput>,
    pub transitions: Vec<TransitionInput>,
}

fn default_version() -> i32 {
    1
}

/// One stage of a new template.
#[derive(Debug, Deserialize)]
pub struct StageInput {
    pub name: String,
    pub stage_order: i32,
    pub stage_kind: StageKind,
    pub assigned_role: String,
    #[serde(default)]
    pub duration_days: i32,
    #[serde(default)]
    pub requires_attachment: bool,
    #[serde(default)]
    pub requires_comment: bool,
    #[serde(default)]
    pub auto_complete: bool,
}

/// One transition of a new template.
#[derive(Debug, Deserialize)]
pub struct TransitionInput {
    pub from_index: usize,
    pub to_index: usize,
    pub condition_kind: ConditionKind,
    #[serde(default)]
    pub condition_data: Option<serde_json::Value>,
}

/// Query parameters for `GET /workflow/templates`.
#[derive(Debug, Deserialize)]
pub struct TemplateListParams {
    pub is_active: Option<bool>,
}

/// Query parameters for `GET /workflow/instances`.
#[derive(Debug, Deserialize)]
pub struct InstanceListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request body for `POST /workflow/instances/{id}/decision`.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub outcome: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Query parameters for `POST /admin/workflow/scan-escalations`.
#[derive(Debug, Deserialize)]
pub struct ScanParams {
    pub dry_run: Option<bool>,
}

// ---------------------------------------------------------------------------
// Template handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/workflow/templates
///
/// Create a template with its whole stage/transition graph. The graph is
/// validated before anything is written.
pub async fn create_template(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppJson(input): AppJson<CreateTemplateRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<TemplateDetail>>)> {
    let stage_defs: Vec<StageDef> = input
        .stages
        .iter()
        .map(|s| StageDef { kind: s.stage_kind, order: s.stage_order })
        .collect();
    let transition_defs: Vec<TransitionDef> = input
        .transitions
        .iter()
        .map(|t| TransitionDef { from: t.from_index, to: t.to_index })
        .collect();

    validate_graph(&stage_defs, &transition_defs)
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    let template = CreateWorkflowTemplate {
        name: input.name,
        version: input.version,
        category: input.category,
        allow_parallel: input.allow_parallel,
        auto_assign: input.auto_assign,
        created_by: Some(admin.user_id),
    };
    let stages: Vec<CreateWorkflowStage> = input
        .stages
        .into_iter()
        .map(|s| CreateWorkflowStage {
            name: s.name,
            stage_order: s.stage_order,
            stage_kind: s.stage_kind,
            assigned_role: s.assigned_role,
            duration_days: s.duration_days,
            requires_attachment: s.requires_attachment,
            requires_comment: s.requires_comment,
            auto_complete: s.auto_complete,
        })
        .collect();
    let transitions: Vec<CreateWorkflowTransition> = input
        .transitions
        .into_iter()
        .map(|t| CreateWorkflowTransition {
            from_index: t.from_index,
            to_index: t.to_index,
            condition_kind: t.condition_kind,
            condition_data: t.condition_data,
        })
        .collect();

    let detail = WorkflowTemplateRepo::create(&state.pool, &template, &stages, &transitions).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// GET /api/v1/workflow/templates
pub async fn list_templates(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<TemplateListParams>,
) -> AppResult<Json<DataResponse<Vec<WorkflowTemplate>>>> {
    let only_active = params.is_active.unwrap_or(false);
    let templates = WorkflowTemplateRepo::list(&state.pool, only_active).await?;
    Ok(Json(DataResponse { data: templates }))
}

/// GET /api/v1/workflow/templates/{id}
pub async fn get_template(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<TemplateDetail>>> {
    let detail = WorkflowTemplateRepo::detail(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow template",
            id,
        }))?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/workflow/templates/{id}/activate
///
/// Re-validates the stored graph before flipping `is_active`. A template
/// that fails validation (possible after manual data surgery) stays off.
pub async fn activate_template(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkflowTemplate>>> {
    let detail = WorkflowTemplateRepo::detail(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow template",
            id,
        }))?;

    let mut stage_defs = Vec::with_capacity(detail.stages.len());
    for stage in &detail.stages {
        let kind = stage.kind().ok_or_else(|| {
            AppError::InternalError(format!("stage {} has unknown kind {}", stage.id, stage.stage_kind))
        })?;
        stage_defs.push(StageDef { kind, order: stage.stage_order });
    }
    let index_of = |stage_id: DbId| detail.stages.iter().position(|s| s.id == stage_id);
    let mut transition_defs = Vec::with_capacity(detail.transitions.len());
    for t in &detail.transitions {
        let (Some(from), Some(to)) = (index_of(t.from_stage_id), index_of(t.to_stage_id)) else {
            return Err(AppError::InternalError(format!(
                "transition {} references a stage outside template {id}",
                t.id
            )));
        };
        transition_defs.push(TransitionDef { from, to });
    }

    validate_graph(&stage_defs, &transition_defs)
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    WorkflowTemplateRepo::set_active(&state.pool, id, true).await?;

    let template = WorkflowTemplateRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow template",
            id,
        }))?;
    Ok(Json(DataResponse { data: template }))
}

// ---------------------------------------------------------------------------
// Instance handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/workflow/instances
///
/// Start an instance of an active template against a transaction.
pub async fn create_instance(
    State(state): State<AppState>,
    RequireEditor(_editor): RequireEditor,
    AppJson(input): AppJson<StartInstance>,
) -> AppResult<(StatusCode, Json<DataResponse<WorkflowInstance>>)> {
    let template = WorkflowTemplateRepo::find_by_id(&state.pool, input.template_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow template",
            id: input.template_id,
        }))?;

    if !template.is_active {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Workflow template '{}' is not active",
            template.name
        ))));
    }

    TransactionRepo::find_by_id(&state.pool, input.transaction_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Transaction",
            id: input.transaction_id,
        }))?;

    let start_stage = WorkflowTemplateRepo::start_stage(&state.pool, template.id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Workflow template '{}' has no start stage",
                template.name
            )))
        })?;

    let instance =
        WorkflowInstanceRepo::start(&state.pool, input.transaction_id, template.id, start_stage.id)
            .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: instance })))
}

/// GET /api/v1/workflow/instances
pub async fn list_instances(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<InstanceListParams>,
) -> AppResult<Json<DataResponse<Vec<InstanceWithStage>>>> {
    if let Some(status) = params.status.as_deref() {
        if status != INSTANCE_ACTIVE && status != INSTANCE_COMPLETED {
            return Err(AppError::BadRequest(format!(
                "Unknown instance status '{status}'; expected {INSTANCE_ACTIVE} or {INSTANCE_COMPLETED}"
            )));
        }
    }

    let limit = params
        .limit
        .unwrap_or(DEFAULT_INSTANCE_PAGE)
        .clamp(1, MAX_INSTANCE_PAGE);
    let offset = params.offset.unwrap_or(0).max(0);

    let instances =
        WorkflowInstanceRepo::list(&state.pool, params.status.as_deref(), limit, offset).await?;
    Ok(Json(DataResponse { data: instances }))
}

/// GET /api/v1/workflow/instances/{id}
pub async fn get_instance(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<InstanceWithStage>>> {
    let instance = WorkflowInstanceRepo::find_with_stage(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow instance",
            id,
        }))?;
    Ok(Json(DataResponse { data: instance }))
}

/// GET /api/v1/workflow/instances/{id}/history
pub async fn instance_history(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<StageHistoryEntry>>>> {
    WorkflowInstanceRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow instance",
            id,
        }))?;

    let history = WorkflowInstanceRepo::history(&state.pool, id).await?;
    Ok(Json(DataResponse { data: history }))
}

/// POST /api/v1/workflow/instances/{id}/decision
///
/// Record an approve/reject decision against the instance's current stage.
/// The stage must be a review or approval stage; the version guard turns a
/// concurrent advancement into a 409.
pub async fn decision(
    State(state): State<AppState>,
    RequireEditor(editor): RequireEditor,
    meta: RequestMeta,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<DecisionRequest>,
) -> AppResult<Json<DataResponse<WorkflowInstance>>> {
    let outcome = StageOutcome::parse(&input.outcome).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Invalid outcome '{}'; expected approved or rejected",
            input.outcome
        ))
    })?;

    let instance = WorkflowInstanceRepo::find_with_stage(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow instance",
            id,
        }))?;

    if instance.status != INSTANCE_ACTIVE {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Workflow instance {id} is {}, decisions are closed",
            instance.status
        ))));
    }

    let kind = instance.kind().ok_or_else(|| {
        AppError::InternalError(format!(
            "stage {} has unknown kind {}",
            instance.current_stage_id, instance.stage_kind
        ))
    })?;
    if !kind.accepts_decision() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Stage '{}' is a {} stage and does not accept decisions",
            instance.stage_name, instance.stage_kind
        ))));
    }

    let stage = WorkflowTemplateRepo::find_stage(&state.pool, instance.current_stage_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow stage",
            id: instance.current_stage_id,
        }))?;
    let comment = input.comment.as_deref().map(str::trim).filter(|c| !c.is_empty());
    if stage.requires_comment && comment.is_none() {
        return Err(AppError::field(
            "Comment required",
            "comment",
            format!("stage '{}' requires a comment with the decision", stage.name),
        ));
    }

    let updated = WorkflowInstanceRepo::record_decision(&state.pool, id, instance.version, outcome)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(
                "Workflow instance was advanced concurrently; re-read and retry".into(),
            ))
        })?;

    let action = match outcome {
        StageOutcome::Approved => ActionKind::Approve,
        StageOutcome::Rejected => ActionKind::Reject,
    };
    append_best_effort(
        &state.pool,
        CreateEventRecord::new(action)
            .with_actor(editor.user_id)
            .with_session(editor.session_id)
            .with_subject(SubjectKind::WorkflowInstance, id)
            .with_description(format!(
                "{} decision on stage '{}'",
                outcome.as_str(),
                instance.stage_name
            ))
            .with_states(None, Some(json!({ "outcome": outcome.as_str(), "comment": comment })))
            .with_client(meta.ip_address, meta.user_agent),
    )
    .await;

    Ok(Json(DataResponse { data: updated }))
}

// ---------------------------------------------------------------------------
// Batch triggers
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/workflow/run-rules
///
/// Run one rule-evaluation pass in-process and return its report.
pub async fn run_rules(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<rules::RuleRunReport>>> {
    let report = rules::run(&state.pool, &state.notifier).await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/admin/workflow/scan-escalations
pub async fn scan_escalations(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<ScanParams>,
) -> AppResult<Json<DataResponse<escalation::EscalationReport>>> {
    let report =
        escalation::run(&state.pool, &state.notifier, params.dry_run.unwrap_or(false)).await?;
    Ok(Json(DataResponse { data: report }))
}
