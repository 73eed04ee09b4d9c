//! Lookup of human-readable labels for event record subjects.
//!
//! The audit detail endpoint enriches a record with the current label of
//! whatever the record points at. Subjects may have been deleted since the
//! record was written, so every branch tolerates a missing row.

use sqlx::PgPool;

use mdc_core::subject::SubjectKind;
use mdc_core::types::DbId;

/// A resolved subject reference.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubjectSummary {
    pub kind: SubjectKind,
    pub id: DbId,
    pub label: String,
}

/// Resolve a subject reference to its current label.
///
/// Returns `None` when the subject row no longer exists, or for the
/// synthetic `request` subject middleware records carry (no backing table).
pub async fn resolve_subject(
    pool: &PgPool,
    kind: SubjectKind,
    id: DbId,
) -> Result<Option<SubjectSummary>, sqlx::Error> {
    let label: Option<String> = match kind {
        SubjectKind::Request => None,
        SubjectKind::User => {
            sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        SubjectKind::Transaction => {
            sqlx::query_scalar("SELECT reference FROM transactions WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        SubjectKind::WorkflowTemplate => {
            sqlx::query_scalar("SELECT name FROM workflow_templates WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        SubjectKind::WorkflowInstance => {
            sqlx::query_scalar(
                "SELECT t.reference FROM workflow_instances i
                 JOIN transactions t ON t.id = i.transaction_id
                 WHERE i.id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await?
        }
        SubjectKind::Notification => {
            sqlx::query_scalar("SELECT title FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        SubjectKind::EventRecord => {
            sqlx::query_scalar("SELECT description FROM event_records WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
    };

    Ok(label.map(|label| SubjectSummary { kind, id, label }))
}
