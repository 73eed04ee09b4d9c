//! Notification entity model and DTOs.

use serde::Serialize;
use sqlx::FromRow;

use mdc_core::types::{DbId, Timestamp};

/// Notification kind for workflow stage changes.
pub const KIND_STAGE_CHANGED: &str = "stage_changed";

/// Notification kind for overdue-stage escalations.
pub const KIND_ESCALATION: &str = "escalation";

/// A notification row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub user_id: DbId,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub subject_table: String,
    pub subject_id: Option<DbId>,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for creating a notification.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: DbId,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub subject_table: String,
    pub subject_id: Option<DbId>,
}
