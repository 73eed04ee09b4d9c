//! Escalation scanner for overdue workflow stages.
//!
//! Detection and recording are split so a dry run can report without
//! writing. Idempotency comes from the `(instance, stage, stage_entered_at)`
//! unique key: one escalation per stage entry, however often the scanner
//! runs, however many scanners run at once.

use chrono::Utc;
use sqlx::PgPool;

use mdc_core::action::ActionKind;
use mdc_core::subject::SubjectKind;
use mdc_core::types::Timestamp;
use mdc_db::models::event_record::CreateEventRecord;
use mdc_db::models::notification::{CreateNotification, KIND_ESCALATION};
use mdc_db::models::user::UserContact;
use mdc_db::models::workflow::OverdueStage;
use mdc_db::repositories::{EscalationRepo, EventRecordRepo, NotificationRepo, UserRepo};
use mdc_notify::Notifier;

/// Upper bound on candidates processed per run.
const BATCH_LIMIT: i64 = 500;

/// Outcome of one scanner run.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct EscalationReport {
    /// Overdue, not-yet-escalated occurrences detected.
    pub overdue: usize,
    /// Occurrences actually recorded this run.
    pub escalated: usize,
}

/// Scan for overdue stages; record and notify unless `dry_run` is set.
pub async fn run(
    pool: &PgPool,
    notifier: &Notifier,
    dry_run: bool,
) -> Result<EscalationReport, sqlx::Error> {
    let now = Utc::now();
    let candidates = EscalationRepo::list_overdue(pool, now, BATCH_LIMIT).await?;
    let mut report = EscalationReport {
        overdue: candidates.len(),
        escalated: 0,
    };

    if dry_run {
        for candidate in &candidates {
            tracing::info!(
                instance_id = candidate.instance_id,
                reference = %candidate.transaction_reference,
                stage = %candidate.stage_name,
                overdue_days = candidate.overdue_days(now),
                "overdue stage (dry run)"
            );
        }
        return Ok(report);
    }

    for candidate in &candidates {
        if escalate_one(pool, notifier, candidate, now).await? {
            report.escalated += 1;
        }
    }

    Ok(report)
}

/// Record one escalation with its audit record and notifications.
///
/// Returns `false` when a concurrent scanner recorded the same occurrence
/// first; everything rolls back and nobody is notified twice.
async fn escalate_one(
    pool: &PgPool,
    notifier: &Notifier,
    candidate: &OverdueStage,
    now: Timestamp,
) -> Result<bool, sqlx::Error> {
    let overdue_days = i32::try_from(candidate.overdue_days(now)).unwrap_or(i32::MAX);

    let recipients: Vec<UserContact> = if candidate.assigned_role.is_empty() {
        Vec::new()
    } else {
        UserRepo::list_active_by_role(pool, &candidate.assigned_role).await?
    };

    let title = format!(
        "{}: stage '{}' is overdue",
        candidate.transaction_reference, candidate.stage_name
    );
    let body = format!(
        "Stage '{}' of {} has been open since {} and is {} day(s) past its {}-day budget.",
        candidate.stage_name,
        candidate.transaction_reference,
        candidate.stage_entered_at.format("%Y-%m-%d"),
        overdue_days,
        candidate.duration_days
    );

    let mut tx = pool.begin().await?;

    if !EscalationRepo::record_in_tx(&mut tx, candidate, overdue_days, now).await? {
        tx.rollback().await?;
        tracing::debug!(
            instance_id = candidate.instance_id,
            stage_id = candidate.stage_id,
            "occurrence already escalated, skipping"
        );
        return Ok(false);
    }

    let record = CreateEventRecord::new(ActionKind::Escalate)
        .with_subject(SubjectKind::WorkflowInstance, candidate.instance_id)
        .with_description(format!(
            "stage '{}' overdue by {} day(s) for {}",
            candidate.stage_name, overdue_days, candidate.transaction_reference
        ));
    EventRecordRepo::append_in_tx(&mut tx, &record).await?;

    for contact in &recipients {
        NotificationRepo::create_in_tx(
            &mut tx,
            &CreateNotification {
                user_id: contact.id,
                kind: KIND_ESCALATION.to_string(),
                title: title.clone(),
                body: body.clone(),
                subject_table: SubjectKind::WorkflowInstance.table_name().to_string(),
                subject_id: Some(candidate.instance_id),
            },
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        instance_id = candidate.instance_id,
        reference = %candidate.transaction_reference,
        stage = %candidate.stage_name,
        overdue_days,
        notified = recipients.len(),
        "stage escalated"
    );

    for contact in &recipients {
        notifier.send(&contact.email, &title, &body).await;
    }

    Ok(true)
}
