//! Audit record retention purge.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use mdc_core::action::ActionKind;
use mdc_core::subject::SubjectKind;
use mdc_core::types::DbId;
use mdc_db::models::event_record::CreateEventRecord;
use mdc_db::repositories::EventRecordRepo;

/// Shortest retention window callers may request.
pub const MIN_RETENTION_DAYS: i64 = 30;

/// Outcome of one purge run.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct PurgeReport {
    /// Records deleted.
    pub deleted: u64,
    /// Retention window applied, in days.
    pub days: i64,
}

/// Delete audit records older than `days` and leave a `delete` record
/// behind when anything actually went.
///
/// `days` must already be validated against [`MIN_RETENTION_DAYS`] (the CLI
/// and the cleanup endpoint both do). `actor_id` attributes the trailing
/// record to the admin who triggered it; `None` marks a scheduled run.
pub async fn run(
    pool: &PgPool,
    days: i64,
    actor_id: Option<DbId>,
) -> Result<PurgeReport, sqlx::Error> {
    let cutoff = Utc::now() - Duration::days(days);
    let deleted = EventRecordRepo::purge_older_than(pool, cutoff).await?;

    if deleted > 0 {
        let mut record = CreateEventRecord::new(ActionKind::Delete)
            .with_subject_kind(SubjectKind::EventRecord)
            .with_description(format!(
                "retention purge removed {deleted} audit records older than {days} days"
            ));
        if let Some(actor_id) = actor_id {
            record = record.with_actor(actor_id);
        }
        EventRecordRepo::append(pool, &record).await?;

        tracing::info!(deleted, days, "audit records purged");
    }

    Ok(PurgeReport { deleted, days })
}
