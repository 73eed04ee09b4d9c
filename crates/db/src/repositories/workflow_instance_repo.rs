//! Repository for workflow instances and their stage history.
//!
//! All writes that move an instance between stages go through optimistic
//! concurrency: the UPDATE carries the version the caller read, and zero
//! rows affected means somebody else advanced the instance first.

use sqlx::PgPool;

use mdc_core::types::{DbId, Timestamp};
use mdc_core::workflow::StageOutcome;

use crate::models::workflow::{
    InstanceWithStage, StageHistoryEntry, WorkflowInstance,
};

/// Column list for `workflow_instances`.
const COLUMNS: &str = "id, transaction_id, template_id, current_stage_id, stage_entered_at, \
                        stage_outcome, status, version, started_at, completed_at, \
                        created_at, updated_at";

/// Column list for instance queries joined with the current stage.
const JOINED_COLUMNS: &str = "\
    i.id, i.transaction_id, i.template_id, i.current_stage_id, i.stage_entered_at, \
    i.stage_outcome, i.status, i.version, i.started_at, i.completed_at, \
    s.name AS stage_name, s.stage_kind AS stage_kind, \
    s.assigned_role AS stage_assigned_role, s.duration_days AS stage_duration_days";

/// Shared FROM fragment for joined instance queries.
const FROM_JOINED: &str =
    "FROM workflow_instances i JOIN workflow_stages s ON s.id = i.current_stage_id";

/// Provides operations for workflow instances.
pub struct WorkflowInstanceRepo;

impl WorkflowInstanceRepo {
    /// Start an instance on the given start stage; the opening history row
    /// commits in the same transaction.
    pub async fn start(
        pool: &PgPool,
        transaction_id: DbId,
        template_id: DbId,
        start_stage_id: DbId,
    ) -> Result<WorkflowInstance, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO workflow_instances (transaction_id, template_id, current_stage_id)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        let instance = sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(transaction_id)
            .bind(template_id)
            .bind(start_stage_id)
            .fetch_one(&mut *tx)
            .await?;

        Self::append_history_in_tx(&mut tx, instance.id, start_stage_id, instance.stage_entered_at)
            .await?;

        tx.commit().await?;
        Ok(instance)
    }

    /// Find an instance by internal ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<WorkflowInstance>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflow_instances WHERE id = $1");
        sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an instance joined with its current stage.
    pub async fn find_with_stage(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<InstanceWithStage>, sqlx::Error> {
        let query = format!("SELECT {JOINED_COLUMNS} {FROM_JOINED} WHERE i.id = $1");
        sqlx::query_as::<_, InstanceWithStage>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List instances, optionally filtered by status, newest first.
    pub async fn list(
        pool: &PgPool,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InstanceWithStage>, sqlx::Error> {
        let filter = if status.is_some() { "WHERE i.status = $3" } else { "" };
        let query = format!(
            "SELECT {JOINED_COLUMNS} {FROM_JOINED} {filter}
             ORDER BY i.started_at DESC, i.id DESC
             LIMIT $1 OFFSET $2"
        );
        let mut q = sqlx::query_as::<_, InstanceWithStage>(&query)
            .bind(limit)
            .bind(offset);
        if let Some(status) = status {
            q = q.bind(status);
        }
        q.fetch_all(pool).await
    }

    /// List all instances attached to a transaction, oldest first.
    pub async fn list_for_transaction(
        pool: &PgPool,
        transaction_id: DbId,
    ) -> Result<Vec<InstanceWithStage>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} {FROM_JOINED}
             WHERE i.transaction_id = $1
             ORDER BY i.id ASC"
        );
        sqlx::query_as::<_, InstanceWithStage>(&query)
            .bind(transaction_id)
            .fetch_all(pool)
            .await
    }

    /// List active instances for the rule evaluator, id order, bounded.
    pub async fn list_active(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<InstanceWithStage>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} {FROM_JOINED}
             WHERE i.status = 'active'
             ORDER BY i.id ASC
             LIMIT $1"
        );
        sqlx::query_as::<_, InstanceWithStage>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Stage history of an instance, oldest first, with stage names joined.
    pub async fn history(
        pool: &PgPool,
        instance_id: DbId,
    ) -> Result<Vec<StageHistoryEntry>, sqlx::Error> {
        sqlx::query_as::<_, StageHistoryEntry>(
            "SELECT h.id, h.instance_id, h.stage_id, s.name AS stage_name, h.entered_at, h.left_at
             FROM workflow_stage_history h
             JOIN workflow_stages s ON s.id = h.stage_id
             WHERE h.instance_id = $1
             ORDER BY h.entered_at ASC, h.id ASC",
        )
        .bind(instance_id)
        .fetch_all(pool)
        .await
    }

    /// Record an approve/reject decision against the current stage.
    ///
    /// The version guard makes concurrent decisions lose cleanly: `None`
    /// means the instance moved (or completed) since the caller read it.
    pub async fn record_decision(
        pool: &PgPool,
        id: DbId,
        expected_version: i32,
        outcome: StageOutcome,
    ) -> Result<Option<WorkflowInstance>, sqlx::Error> {
        let query = format!(
            "UPDATE workflow_instances SET
                stage_outcome = $3,
                version = version + 1,
                updated_at = NOW()
             WHERE id = $1 AND version = $2 AND status = 'active'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(outcome.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Move an instance to `to_stage_id`, resetting the stage outcome.
    ///
    /// When `completes` is set the instance also flips to `completed` with
    /// `completed_at = now`. Returns `None` when the version guard fails,
    /// in which case the caller must roll back the surrounding transaction.
    pub async fn advance_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
        expected_version: i32,
        to_stage_id: DbId,
        now: Timestamp,
        completes: bool,
    ) -> Result<Option<WorkflowInstance>, sqlx::Error> {
        let query = format!(
            "UPDATE workflow_instances SET
                current_stage_id = $3,
                stage_entered_at = $4,
                stage_outcome = NULL,
                status = CASE WHEN $5 THEN 'completed' ELSE status END,
                completed_at = CASE WHEN $5 THEN $4 ELSE completed_at END,
                version = version + 1,
                updated_at = $4
             WHERE id = $1 AND version = $2 AND status = 'active'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowInstance>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(to_stage_id)
            .bind(now)
            .bind(completes)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Close the open history row (the one with `left_at IS NULL`).
    pub async fn close_history_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        instance_id: DbId,
        left_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE workflow_stage_history SET left_at = $2
             WHERE instance_id = $1 AND left_at IS NULL",
        )
        .bind(instance_id)
        .bind(left_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Append a history row for a newly entered stage.
    pub async fn append_history_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        instance_id: DbId,
        stage_id: DbId,
        entered_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO workflow_stage_history (instance_id, stage_id, entered_at)
             VALUES ($1, $2, $3)",
        )
        .bind(instance_id)
        .bind(stage_id)
        .bind(entered_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
