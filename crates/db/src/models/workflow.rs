//! Workflow entity models and DTOs: templates, stages, transitions,
//! instances, stage history, escalations.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mdc_core::types::{DbId, Timestamp};
use mdc_core::workflow::{ConditionKind, StageKind, StageOutcome};

/// Instance status: still being evaluated.
pub const INSTANCE_ACTIVE: &str = "active";

/// Instance status: reached a terminal stage.
pub const INSTANCE_COMPLETED: &str = "completed";

// ---------------------------------------------------------------------------
// Template / stage / transition entities
// ---------------------------------------------------------------------------

/// A workflow template row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowTemplate {
    pub id: DbId,
    pub name: String,
    pub version: i32,
    pub category: String,
    pub is_active: bool,
    pub allow_parallel: bool,
    pub auto_assign: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A workflow stage row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowStage {
    pub id: DbId,
    pub template_id: DbId,
    pub name: String,
    pub stage_order: i32,
    pub stage_kind: String,
    pub assigned_role: String,
    pub duration_days: i32,
    pub requires_attachment: bool,
    pub requires_comment: bool,
    pub auto_complete: bool,
    pub created_at: Timestamp,
}

impl WorkflowStage {
    /// Parsed stage kind. The column is CHECK-constrained, so a parse
    /// failure can only mean schema drift.
    pub fn kind(&self) -> Option<StageKind> {
        StageKind::parse(&self.stage_kind)
    }
}

/// A workflow transition row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowTransition {
    pub id: DbId,
    pub template_id: DbId,
    pub from_stage_id: DbId,
    pub to_stage_id: DbId,
    pub condition_kind: String,
    pub condition_data: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

impl WorkflowTransition {
    pub fn condition(&self) -> Option<ConditionKind> {
        ConditionKind::parse(&self.condition_kind)
    }
}

/// A template together with its full stage/transition graph.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateDetail {
    pub template: WorkflowTemplate,
    pub stages: Vec<WorkflowStage>,
    pub transitions: Vec<WorkflowTransition>,
}

// ---------------------------------------------------------------------------
// Template create DTOs
// ---------------------------------------------------------------------------

/// DTO for creating a workflow template with its graph in one transaction.
#[derive(Debug, Clone)]
pub struct CreateWorkflowTemplate {
    pub name: String,
    pub version: i32,
    pub category: String,
    pub allow_parallel: bool,
    pub auto_assign: bool,
    pub created_by: Option<DbId>,
}

/// DTO for one stage of a new template.
#[derive(Debug, Clone)]
pub struct CreateWorkflowStage {
    pub name: String,
    pub stage_order: i32,
    pub stage_kind: StageKind,
    pub assigned_role: String,
    pub duration_days: i32,
    pub requires_attachment: bool,
    pub requires_comment: bool,
    pub auto_complete: bool,
}

/// DTO for one transition of a new template.
///
/// `from_index`/`to_index` refer to positions in the submitted stage list;
/// the repository maps them to row ids after inserting the stages.
#[derive(Debug, Clone)]
pub struct CreateWorkflowTransition {
    pub from_index: usize,
    pub to_index: usize,
    pub condition_kind: ConditionKind,
    pub condition_data: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Instance entities
// ---------------------------------------------------------------------------

/// A workflow instance row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowInstance {
    pub id: DbId,
    pub transaction_id: DbId,
    pub template_id: DbId,
    pub current_stage_id: DbId,
    pub stage_entered_at: Timestamp,
    pub stage_outcome: Option<String>,
    pub status: String,
    pub version: i32,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WorkflowInstance {
    pub fn outcome(&self) -> Option<StageOutcome> {
        self.stage_outcome.as_deref().and_then(StageOutcome::parse)
    }
}

/// An instance joined with its current stage, as used by listings and the
/// rule evaluator.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InstanceWithStage {
    pub id: DbId,
    pub transaction_id: DbId,
    pub template_id: DbId,
    pub current_stage_id: DbId,
    pub stage_entered_at: Timestamp,
    pub stage_outcome: Option<String>,
    pub status: String,
    pub version: i32,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub stage_name: String,
    pub stage_kind: String,
    pub stage_assigned_role: String,
    pub stage_duration_days: i32,
}

impl InstanceWithStage {
    pub fn outcome(&self) -> Option<StageOutcome> {
        self.stage_outcome.as_deref().and_then(StageOutcome::parse)
    }

    pub fn kind(&self) -> Option<StageKind> {
        StageKind::parse(&self.stage_kind)
    }
}

/// DTO for starting a new instance.
#[derive(Debug, Clone, Deserialize)]
pub struct StartInstance {
    pub transaction_id: DbId,
    pub template_id: DbId,
}

/// A stage-history row joined with the stage name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StageHistoryEntry {
    pub id: DbId,
    pub instance_id: DbId,
    pub stage_id: DbId,
    pub stage_name: String,
    pub entered_at: Timestamp,
    pub left_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Escalations
// ---------------------------------------------------------------------------

/// A recorded escalation occurrence.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowEscalation {
    pub id: DbId,
    pub instance_id: DbId,
    pub stage_id: DbId,
    pub stage_entered_at: Timestamp,
    pub overdue_days: i32,
    pub escalated_at: Timestamp,
}

/// An overdue instance/stage pair detected by the escalation scanner.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OverdueStage {
    pub instance_id: DbId,
    pub transaction_id: DbId,
    pub transaction_reference: String,
    pub stage_id: DbId,
    pub stage_name: String,
    pub assigned_role: String,
    pub duration_days: i32,
    pub stage_entered_at: Timestamp,
}

impl OverdueStage {
    /// Whole days the stage is past its duration budget at `now`.
    pub fn overdue_days(&self, now: Timestamp) -> i64 {
        let days_in_stage = (now - self.stage_entered_at).num_days();
        (days_in_stage - i64::from(self.duration_days)).max(0)
    }
}
