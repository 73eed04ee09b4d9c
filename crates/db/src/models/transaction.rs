//! Business transaction entity model and DTOs.
//!
//! The surrounding system owns transaction CRUD; this service creates rows
//! only in tests and otherwise reads them for workflow binding and audit
//! subject resolution.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mdc_core::types::{DbId, Timestamp};

/// A transaction row from the `transactions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub id: DbId,
    pub reference: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new transaction.
#[derive(Debug, Deserialize)]
pub struct CreateTransaction {
    pub reference: String,
    pub title: String,
    pub description: Option<String>,
    pub created_by: Option<DbId>,
}
