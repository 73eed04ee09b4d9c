//! Repository for the `transactions` table.
//!
//! Transactions are the business subject workflow instances bind to. They
//! are created by the surrounding system; this service only reads them and
//! references them from instances, so the surface here is minimal.

use sqlx::PgPool;

use mdc_core::types::DbId;

use crate::models::transaction::{CreateTransaction, Transaction};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, reference, title, description, status, created_by, created_at, updated_at";

/// Provides read and insert operations for transactions.
pub struct TransactionRepo;

impl TransactionRepo {
    /// Insert a new transaction, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateTransaction,
    ) -> Result<Transaction, sqlx::Error> {
        let query = format!(
            "INSERT INTO transactions (reference, title, description, created_by)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(&input.reference)
            .bind(&input.title)
            .bind(input.description.as_deref().unwrap_or(""))
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    /// Find a transaction by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Transaction>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM transactions WHERE id = $1");
        sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a transaction by its unique business reference.
    pub async fn find_by_reference(
        pool: &PgPool,
        reference: &str,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM transactions WHERE reference = $1");
        sqlx::query_as::<_, Transaction>(&query)
            .bind(reference)
            .fetch_optional(pool)
            .await
    }
}
