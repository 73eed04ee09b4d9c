//! Workflow rule evaluator.
//!
//! One pass over the active instances: for each, pick the single best
//! satisfied transition out of the current stage and fire it. Narrow guards
//! (`approval`, `rejection`) outrank `always`; remaining ties break on
//! transition id, so evaluation order is deterministic.
//!
//! Firing is transactional (instance update, history, audit record,
//! notification rows commit together); emails go out only after commit and
//! never affect the outcome.

use chrono::Utc;
use sqlx::PgPool;

use mdc_core::action::ActionKind;
use mdc_core::subject::SubjectKind;
use mdc_core::workflow::{completes_instance, guard_satisfied, StageOutcome};
use mdc_db::models::event_record::CreateEventRecord;
use mdc_db::models::notification::{CreateNotification, KIND_STAGE_CHANGED};
use mdc_db::models::user::UserContact;
use mdc_db::models::workflow::{InstanceWithStage, WorkflowTransition};
use mdc_db::repositories::{
    EventRecordRepo, NotificationRepo, TransactionRepo, UserRepo, WorkflowInstanceRepo,
    WorkflowTemplateRepo,
};
use mdc_notify::Notifier;

/// Upper bound on instances examined per run. A backlog larger than this
/// drains over consecutive scheduler ticks.
const BATCH_LIMIT: i64 = 500;

/// Outcome of one evaluator run.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RuleRunReport {
    /// Active instances examined.
    pub examined: usize,
    /// Instances that moved to a new stage.
    pub advanced: usize,
}

/// Evaluate transition rules across all active instances.
pub async fn run(pool: &PgPool, notifier: &Notifier) -> Result<RuleRunReport, sqlx::Error> {
    let instances = WorkflowInstanceRepo::list_active(pool, BATCH_LIMIT).await?;
    let mut report = RuleRunReport {
        examined: instances.len(),
        advanced: 0,
    };

    for instance in &instances {
        if advance_one(pool, notifier, instance).await? {
            report.advanced += 1;
        }
    }

    Ok(report)
}

/// Evaluate and, when a guard fires, advance a single instance.
///
/// Returns `false` when no guard is satisfied or another writer moved the
/// instance first; both are normal outcomes, not errors.
async fn advance_one(
    pool: &PgPool,
    notifier: &Notifier,
    instance: &InstanceWithStage,
) -> Result<bool, sqlx::Error> {
    let transitions =
        WorkflowTemplateRepo::transitions_from(pool, instance.current_stage_id).await?;
    let Some(chosen) = pick_transition(&transitions, instance.outcome()) else {
        return Ok(false);
    };

    let Some(target) = WorkflowTemplateRepo::find_stage(pool, chosen.to_stage_id).await? else {
        tracing::warn!(
            instance_id = instance.id,
            stage_id = chosen.to_stage_id,
            "transition target stage missing, skipping instance"
        );
        return Ok(false);
    };
    let Some(target_kind) = target.kind() else {
        tracing::warn!(
            stage_id = target.id,
            stage_kind = %target.stage_kind,
            "unrecognized stage kind, skipping instance"
        );
        return Ok(false);
    };
    let completes = completes_instance(target_kind, target.auto_complete);

    // The FK makes the transaction row exist; the fallback label only covers
    // a concurrent delete between the two reads.
    let reference = TransactionRepo::find_by_id(pool, instance.transaction_id)
        .await?
        .map(|t| t.reference)
        .unwrap_or_else(|| format!("transaction #{}", instance.transaction_id));

    let recipients: Vec<UserContact> = if target.assigned_role.is_empty() {
        Vec::new()
    } else {
        UserRepo::list_active_by_role(pool, &target.assigned_role).await?
    };

    let title = format!("{reference}: entered stage '{}'", target.name);
    let body = if completes {
        format!(
            "Workflow instance {} for {reference} entered stage '{}' and completed.",
            instance.id, target.name
        )
    } else {
        format!(
            "Workflow instance {} for {reference} entered stage '{}'. Assigned role: {}.",
            instance.id, target.name, target.assigned_role
        )
    };

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let Some(advanced) = WorkflowInstanceRepo::advance_in_tx(
        &mut tx,
        instance.id,
        instance.version,
        target.id,
        now,
        completes,
    )
    .await?
    else {
        // Version guard failed: a concurrent run or decision moved it first.
        tx.rollback().await?;
        tracing::debug!(instance_id = instance.id, "instance advanced concurrently, skipping");
        return Ok(false);
    };

    WorkflowInstanceRepo::close_history_in_tx(&mut tx, instance.id, now).await?;
    WorkflowInstanceRepo::append_history_in_tx(&mut tx, instance.id, target.id, now).await?;

    let record = CreateEventRecord::new(ActionKind::Update)
        .with_subject(SubjectKind::WorkflowInstance, instance.id)
        .with_description(format!(
            "workflow for {reference} moved from '{}' to '{}'",
            instance.stage_name, target.name
        ))
        .with_states(
            Some(serde_json::json!({
                "stage_id": instance.current_stage_id,
                "stage_name": instance.stage_name,
                "status": instance.status,
            })),
            Some(serde_json::json!({
                "stage_id": target.id,
                "stage_name": target.name,
                "status": advanced.status,
            })),
        );
    EventRecordRepo::append_in_tx(&mut tx, &record).await?;

    for contact in &recipients {
        NotificationRepo::create_in_tx(
            &mut tx,
            &CreateNotification {
                user_id: contact.id,
                kind: KIND_STAGE_CHANGED.to_string(),
                title: title.clone(),
                body: body.clone(),
                subject_table: SubjectKind::WorkflowInstance.table_name().to_string(),
                subject_id: Some(instance.id),
            },
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        instance_id = instance.id,
        from = %instance.stage_name,
        to = %target.name,
        completed = completes,
        notified = recipients.len(),
        "workflow instance advanced"
    );

    for contact in &recipients {
        notifier.send(&contact.email, &title, &body).await;
    }

    Ok(true)
}

/// Pick the transition to fire: satisfied guards only, narrowest condition
/// first, then lowest id. Rows with an unknown condition kind are skipped
/// (the CHECK constraint makes that schema drift, not data entry).
fn pick_transition(
    transitions: &[WorkflowTransition],
    outcome: Option<StageOutcome>,
) -> Option<&WorkflowTransition> {
    transitions
        .iter()
        .filter_map(|t| t.condition().map(|c| (c, t)))
        .filter(|(condition, _)| guard_satisfied(*condition, outcome))
        .min_by_key(|(condition, t)| (condition.priority(), t.id))
        .map(|(_, t)| t)
}
