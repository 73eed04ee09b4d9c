//! HTTP handler modules, one per resource.

pub mod admin;
pub mod audit;
pub mod auth;
pub mod notification;
pub mod workflow;

use mdc_db::models::event_record::CreateEventRecord;
use mdc_db::repositories::EventRecordRepo;
use mdc_db::DbPool;

/// Append an audit record without letting a write failure surface.
///
/// Handler-originated records follow the same rule as the middleware:
/// the primary operation already succeeded, so a logging failure is
/// warned about and swallowed.
pub(crate) async fn append_best_effort(pool: &DbPool, record: CreateEventRecord) {
    if let Err(e) = EventRecordRepo::append(pool, &record).await {
        tracing::warn!(error = %e, action = %record.action, "audit record append failed");
    }
}
