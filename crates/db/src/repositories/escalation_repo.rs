//! Repository for workflow escalations.
//!
//! Detection is an anti-join against the escalation table itself, so an
//! occurrence already recorded for the same (instance, stage, entry) never
//! comes back as a candidate. The unique constraint backs the same rule at
//! write time for scanners racing each other.

use sqlx::PgPool;

use mdc_core::types::{DbId, Timestamp};

use crate::models::workflow::{OverdueStage, WorkflowEscalation};

/// Column list for `workflow_escalations`.
const COLUMNS: &str = "id, instance_id, stage_id, stage_entered_at, overdue_days, escalated_at";

/// Provides detection and recording of overdue-stage escalations.
pub struct EscalationRepo;

impl EscalationRepo {
    /// Find active instances whose current stage has exceeded its duration
    /// at `now` and has not yet been escalated for this entry.
    ///
    /// Stages with `duration_days = 0` have no deadline and are skipped.
    pub async fn list_overdue(
        pool: &PgPool,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<OverdueStage>, sqlx::Error> {
        sqlx::query_as::<_, OverdueStage>(
            "SELECT i.id AS instance_id, i.transaction_id, t.reference AS transaction_reference,
                    s.id AS stage_id, s.name AS stage_name, s.assigned_role, s.duration_days,
                    i.stage_entered_at
             FROM workflow_instances i
             JOIN workflow_stages s ON s.id = i.current_stage_id
             JOIN transactions t ON t.id = i.transaction_id
             LEFT JOIN workflow_escalations x
                    ON x.instance_id = i.id
                   AND x.stage_id = s.id
                   AND x.stage_entered_at = i.stage_entered_at
             WHERE i.status = 'active'
               AND s.duration_days > 0
               AND i.stage_entered_at + make_interval(days => s.duration_days) < $1
               AND x.id IS NULL
             ORDER BY i.stage_entered_at ASC, i.id ASC
             LIMIT $2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Record an escalation occurrence. Returns `true` if this call created
    /// the row; `false` means another scanner got there first.
    pub async fn record_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        overdue: &OverdueStage,
        overdue_days: i32,
        escalated_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO workflow_escalations
                 (instance_id, stage_id, stage_entered_at, overdue_days, escalated_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT ON CONSTRAINT uq_workflow_escalations_occurrence DO NOTHING",
        )
        .bind(overdue.instance_id)
        .bind(overdue.stage_id)
        .bind(overdue.stage_entered_at)
        .bind(overdue_days)
        .bind(escalated_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List escalations recorded for an instance, newest first.
    pub async fn list_for_instance(
        pool: &PgPool,
        instance_id: DbId,
    ) -> Result<Vec<WorkflowEscalation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_escalations
             WHERE instance_id = $1
             ORDER BY escalated_at DESC, id DESC"
        );
        sqlx::query_as::<_, WorkflowEscalation>(&query)
            .bind(instance_id)
            .fetch_all(pool)
            .await
    }
}
