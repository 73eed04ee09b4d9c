//! Repository for workflow templates, stages and transitions.
//!
//! Template graphs are immutable once created: the only mutation is the
//! `is_active` flag. Versioning a workflow means creating a new template
//! row with the same name and a higher version.

use sqlx::PgPool;

use mdc_core::types::DbId;

use crate::models::workflow::{
    CreateWorkflowStage, CreateWorkflowTemplate, CreateWorkflowTransition, TemplateDetail,
    WorkflowStage, WorkflowTemplate, WorkflowTransition,
};

/// Column list for `workflow_templates`.
const TEMPLATE_COLUMNS: &str = "id, name, version, category, is_active, allow_parallel, \
                                 auto_assign, created_by, created_at, updated_at";

/// Column list for `workflow_stages`.
const STAGE_COLUMNS: &str = "id, template_id, name, stage_order, stage_kind, assigned_role, \
                              duration_days, requires_attachment, requires_comment, \
                              auto_complete, created_at";

/// Column list for `workflow_transitions`.
const TRANSITION_COLUMNS: &str =
    "id, template_id, from_stage_id, to_stage_id, condition_kind, condition_data, created_at";

/// Provides operations for workflow template graphs.
pub struct WorkflowTemplateRepo;

impl WorkflowTemplateRepo {
    /// Insert a template with its whole stage/transition graph in one
    /// transaction.
    ///
    /// Transition `from_index`/`to_index` values refer to positions in
    /// `stages` and must already be validated against the stage list
    /// (`mdc_core::workflow::validate_graph`); they are mapped to row ids
    /// here after the stages are inserted.
    pub async fn create(
        pool: &PgPool,
        template: &CreateWorkflowTemplate,
        stages: &[CreateWorkflowStage],
        transitions: &[CreateWorkflowTransition],
    ) -> Result<TemplateDetail, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let template_query = format!(
            "INSERT INTO workflow_templates (name, version, category, allow_parallel, auto_assign, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {TEMPLATE_COLUMNS}"
        );
        let template_row = sqlx::query_as::<_, WorkflowTemplate>(&template_query)
            .bind(&template.name)
            .bind(template.version)
            .bind(&template.category)
            .bind(template.allow_parallel)
            .bind(template.auto_assign)
            .bind(template.created_by)
            .fetch_one(&mut *tx)
            .await?;

        let stage_query = format!(
            "INSERT INTO workflow_stages (template_id, name, stage_order, stage_kind, assigned_role,
                                          duration_days, requires_attachment, requires_comment, auto_complete)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {STAGE_COLUMNS}"
        );
        let mut stage_rows = Vec::with_capacity(stages.len());
        for stage in stages {
            let row = sqlx::query_as::<_, WorkflowStage>(&stage_query)
                .bind(template_row.id)
                .bind(&stage.name)
                .bind(stage.stage_order)
                .bind(stage.stage_kind.as_str())
                .bind(&stage.assigned_role)
                .bind(stage.duration_days)
                .bind(stage.requires_attachment)
                .bind(stage.requires_comment)
                .bind(stage.auto_complete)
                .fetch_one(&mut *tx)
                .await?;
            stage_rows.push(row);
        }

        let transition_query = format!(
            "INSERT INTO workflow_transitions (template_id, from_stage_id, to_stage_id, condition_kind, condition_data)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {TRANSITION_COLUMNS}"
        );
        let mut transition_rows = Vec::with_capacity(transitions.len());
        for transition in transitions {
            let row = sqlx::query_as::<_, WorkflowTransition>(&transition_query)
                .bind(template_row.id)
                .bind(stage_rows[transition.from_index].id)
                .bind(stage_rows[transition.to_index].id)
                .bind(transition.condition_kind.as_str())
                .bind(&transition.condition_data)
                .fetch_one(&mut *tx)
                .await?;
            transition_rows.push(row);
        }

        tx.commit().await?;

        Ok(TemplateDetail {
            template: template_row,
            stages: stage_rows,
            transitions: transition_rows,
        })
    }

    /// Find a template by internal ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<WorkflowTemplate>, sqlx::Error> {
        let query = format!("SELECT {TEMPLATE_COLUMNS} FROM workflow_templates WHERE id = $1");
        sqlx::query_as::<_, WorkflowTemplate>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Load a template with its full graph. Stages come back in
    /// `stage_order`; transitions in id order.
    pub async fn detail(pool: &PgPool, id: DbId) -> Result<Option<TemplateDetail>, sqlx::Error> {
        let Some(template) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let stage_query = format!(
            "SELECT {STAGE_COLUMNS} FROM workflow_stages
             WHERE template_id = $1 ORDER BY stage_order ASC"
        );
        let stages = sqlx::query_as::<_, WorkflowStage>(&stage_query)
            .bind(id)
            .fetch_all(pool)
            .await?;

        let transition_query = format!(
            "SELECT {TRANSITION_COLUMNS} FROM workflow_transitions
             WHERE template_id = $1 ORDER BY id ASC"
        );
        let transitions = sqlx::query_as::<_, WorkflowTransition>(&transition_query)
            .bind(id)
            .fetch_all(pool)
            .await?;

        Ok(Some(TemplateDetail { template, stages, transitions }))
    }

    /// List templates, optionally restricted to active ones. Ordered by
    /// name, newest version first.
    pub async fn list(
        pool: &PgPool,
        only_active: bool,
    ) -> Result<Vec<WorkflowTemplate>, sqlx::Error> {
        let filter = if only_active { "WHERE is_active = true" } else { "" };
        let query = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM workflow_templates {filter}
             ORDER BY name ASC, version DESC"
        );
        sqlx::query_as::<_, WorkflowTemplate>(&query)
            .fetch_all(pool)
            .await
    }

    /// Flip a template's `is_active` flag. Returns `true` if the row was
    /// updated.
    pub async fn set_active(pool: &PgPool, id: DbId, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workflow_templates SET is_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(active)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a single stage by ID.
    pub async fn find_stage(
        pool: &PgPool,
        stage_id: DbId,
    ) -> Result<Option<WorkflowStage>, sqlx::Error> {
        let query = format!("SELECT {STAGE_COLUMNS} FROM workflow_stages WHERE id = $1");
        sqlx::query_as::<_, WorkflowStage>(&query)
            .bind(stage_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a template's start stage.
    pub async fn start_stage(
        pool: &PgPool,
        template_id: DbId,
    ) -> Result<Option<WorkflowStage>, sqlx::Error> {
        let query = format!(
            "SELECT {STAGE_COLUMNS} FROM workflow_stages
             WHERE template_id = $1 AND stage_kind = 'start'"
        );
        sqlx::query_as::<_, WorkflowStage>(&query)
            .bind(template_id)
            .fetch_optional(pool)
            .await
    }

    /// List transitions departing a stage, in id order. Id order is the
    /// tie-break when several guards are satisfied at the same priority.
    pub async fn transitions_from(
        pool: &PgPool,
        stage_id: DbId,
    ) -> Result<Vec<WorkflowTransition>, sqlx::Error> {
        let query = format!(
            "SELECT {TRANSITION_COLUMNS} FROM workflow_transitions
             WHERE from_stage_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, WorkflowTransition>(&query)
            .bind(stage_id)
            .fetch_all(pool)
            .await
    }
}
