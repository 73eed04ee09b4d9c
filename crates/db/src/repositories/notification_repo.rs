//! Repository for the `notifications` table.

use sqlx::PgPool;

use mdc_core::types::DbId;

use crate::models::notification::{CreateNotification, Notification};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, kind, title, body, subject_table, subject_id, \
                        is_read, read_at, created_at";

/// Provides operations for in-app notifications.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Insert a notification, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateNotification,
    ) -> Result<Notification, sqlx::Error> {
        let query = insert_query();
        bind_create(sqlx::query_as::<_, Notification>(&query), input)
            .fetch_one(pool)
            .await
    }

    /// Insert a notification inside an open transaction, so stage-change
    /// notifications commit atomically with the instance update.
    pub async fn create_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        input: &CreateNotification,
    ) -> Result<Notification, sqlx::Error> {
        let query = insert_query();
        bind_create(sqlx::query_as::<_, Notification>(&query), input)
            .fetch_one(&mut **tx)
            .await
    }

    /// List notifications for a user, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let filter = if unread_only { "AND is_read = false" } else { "" };
        let query = format!(
            "SELECT {COLUMNS} FROM notifications
             WHERE user_id = $1 {filter}
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count unread notifications for a user.
    pub async fn unread_count(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM notifications WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Mark one notification as read. The `user_id` guard keeps users from
    /// acknowledging each other's notifications.
    ///
    /// Returns `true` if the row was updated.
    pub async fn mark_read(pool: &PgPool, id: DbId, user_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, read_at = NOW()
             WHERE id = $1 AND user_id = $2 AND is_read = false",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark all of a user's notifications as read. Returns the count updated.
    pub async fn mark_all_read(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, read_at = NOW()
             WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn insert_query() -> String {
    format!(
        "INSERT INTO notifications (user_id, kind, title, body, subject_table, subject_id)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {COLUMNS}"
    )
}

fn bind_create<'q>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, Notification, sqlx::postgres::PgArguments>,
    input: &'q CreateNotification,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, Notification, sqlx::postgres::PgArguments> {
    q.bind(input.user_id)
        .bind(&input.kind)
        .bind(&input.title)
        .bind(&input.body)
        .bind(&input.subject_table)
        .bind(input.subject_id)
}
