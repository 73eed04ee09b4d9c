//! Repository for the `event_records` table.
//!
//! Append-only semantics: inserts, reads, aggregation, and age-based
//! deletes. There is deliberately no update method.

use chrono::Duration;
use sqlx::PgPool;

use mdc_core::action::ActionKind;
use mdc_core::types::Timestamp;

use crate::models::event_record::{
    ActionCount, ActorCount, CreateEventRecord, EventRecord, EventRecordQuery,
    EventRecordSummary, EventRecordWithActor, StatisticsReport, TimelineBucket,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

/// Column list for plain `event_records` queries.
const COLUMNS: &str = "\
    id, actor_id, action, subject_table, subject_id, before_state, \
    after_state, description, ip_address, user_agent, session_id, \
    http_method, path, status_code, created_at";

/// Column list for INSERT (excludes auto-generated `id` and `created_at`).
const INSERT_COLUMNS: &str = "\
    actor_id, action, subject_table, subject_id, before_state, after_state, \
    description, ip_address, user_agent, session_id, http_method, path, \
    status_code";

/// Column list for queries joined with the actor's user row.
const JOINED_COLUMNS: &str = "\
    e.id, e.actor_id, u.username AS actor_username, u.email AS actor_email, \
    e.action, e.subject_table, e.subject_id, e.before_state, e.after_state, \
    e.description, e.ip_address, e.user_agent, e.session_id, e.http_method, \
    e.path, e.status_code, e.created_at";

/// Shared FROM fragment for joined queries. The join is LEFT because
/// middleware records have no actor.
const FROM_JOINED: &str = "FROM event_records e LEFT JOIN users u ON u.id = e.actor_id";

/// Upper bound on rows returned by a single export query.
const EXPORT_LIMIT: i64 = 10_000;

// ---------------------------------------------------------------------------
// EventRecordRepo
// ---------------------------------------------------------------------------

/// Provides append, query, statistics and purge operations for the audit log.
pub struct EventRecordRepo;

impl EventRecordRepo {
    /// Append a single event record, returning the created row.
    ///
    /// Fails only on constraint violation; never blocks concurrent reads.
    pub async fn append(
        pool: &PgPool,
        input: &CreateEventRecord,
    ) -> Result<EventRecord, sqlx::Error> {
        let query = insert_query();
        bind_create(sqlx::query_as::<_, EventRecord>(&query), input)
            .fetch_one(pool)
            .await
    }

    /// Append a record inside an open transaction, so that job-originated
    /// audit entries commit atomically with the state change they describe.
    pub async fn append_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        input: &CreateEventRecord,
    ) -> Result<EventRecord, sqlx::Error> {
        let query = insert_query();
        bind_create(sqlx::query_as::<_, EventRecord>(&query), input)
            .fetch_one(&mut **tx)
            .await
    }

    /// Query event records with filtering and pagination, newest first.
    ///
    /// Ordering is `created_at DESC, id DESC` so pages stay stable when
    /// records share a timestamp.
    pub async fn query(
        pool: &PgPool,
        params: &EventRecordQuery,
    ) -> Result<Vec<EventRecordWithActor>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = params.offset.unwrap_or(0).max(0);

        let (where_clause, bind_values, bind_idx) = build_event_filter(params);

        let query = format!(
            "SELECT {JOINED_COLUMNS} {FROM_JOINED} {where_clause} \
             ORDER BY e.created_at DESC, e.id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );

        let q = bind_values_as(sqlx::query_as::<_, EventRecordWithActor>(&query), &bind_values);
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count event records matching the filter (for pagination metadata).
    pub async fn count(pool: &PgPool, params: &EventRecordQuery) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values, _) = build_event_filter(params);

        let query = format!("SELECT COUNT(*)::BIGINT {FROM_JOINED} {where_clause}");

        let q = bind_values_scalar(sqlx::query_scalar::<_, i64>(&query), &bind_values);
        q.fetch_one(pool).await
    }

    /// Find a single record by id, with the actor joined in.
    pub async fn find_by_id(
        pool: &PgPool,
        id: i64,
    ) -> Result<Option<EventRecordWithActor>, sqlx::Error> {
        let query = format!("SELECT {JOINED_COLUMNS} {FROM_JOINED} WHERE e.id = $1");
        sqlx::query_as::<_, EventRecordWithActor>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Export records in a time range, oldest first, capped at
    /// [`EXPORT_LIMIT`] rows.
    pub async fn export_range(
        pool: &PgPool,
        from: Option<Timestamp>,
        to: Option<Timestamp>,
    ) -> Result<Vec<EventRecordWithActor>, sqlx::Error> {
        let params = EventRecordQuery { from, to, ..Default::default() };
        let (where_clause, bind_values, bind_idx) = build_event_filter(&params);

        let query = format!(
            "SELECT {JOINED_COLUMNS} {FROM_JOINED} {where_clause} \
             ORDER BY e.created_at ASC, e.id ASC LIMIT ${bind_idx}"
        );

        let q = bind_values_as(sqlx::query_as::<_, EventRecordWithActor>(&query), &bind_values);
        q.bind(EXPORT_LIMIT).fetch_all(pool).await
    }

    /// Delete all records created before `cutoff`. Returns the count deleted.
    pub async fn purge_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM event_records WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Compute the point-in-time statistics object over the filtered set.
    ///
    /// Every window is anchored at the single `now` passed in, so the
    /// timeline buckets add up to the 24-hour total even while writes
    /// continue concurrently.
    pub async fn statistics(
        pool: &PgPool,
        params: &EventRecordQuery,
        now: Timestamp,
    ) -> Result<StatisticsReport, sqlx::Error> {
        let total_events = Self::count_window(pool, params, now - Duration::days(30), None).await?;
        let active_actors = Self::distinct_actors_window(pool, params, now - Duration::days(7)).await?;
        let security_alerts = Self::count_window(
            pool,
            params,
            now - Duration::hours(24),
            Some(&ActionKind::ALERT_KINDS),
        )
        .await?;
        let errors_24h = Self::count_window(
            pool,
            params,
            now - Duration::hours(24),
            Some(&ActionKind::ERROR_KINDS),
        )
        .await?;
        let recent_activities = Self::recent_summaries(pool, params).await?;
        let activity_by_action =
            Self::counts_by_action(pool, params, now - Duration::days(7)).await?;
        let activity_by_user = Self::top_actors(pool, params, now - Duration::days(7)).await?;
        let activity_timeline = Self::hourly_timeline(pool, params, now).await?;

        Ok(StatisticsReport {
            total_events,
            active_actors,
            security_alerts,
            system_health: mdc_core::action::system_health(errors_24h),
            recent_activities,
            activity_by_action,
            activity_by_user,
            activity_timeline,
        })
    }

    // -----------------------------------------------------------------------
    // Statistics helpers
    // -----------------------------------------------------------------------

    /// Count filtered records created at or after `since`, optionally
    /// restricted to a fixed kind set.
    async fn count_window(
        pool: &PgPool,
        params: &EventRecordQuery,
        since: Timestamp,
        kinds: Option<&[ActionKind]>,
    ) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values, bind_idx) = build_event_filter(params);
        let mut clause = append_condition(&where_clause, &format!("e.created_at >= ${bind_idx}"));
        if let Some(kinds) = kinds {
            clause = append_condition(&clause, &format!("e.action IN ({})", quoted_kinds(kinds)));
        }

        let query = format!("SELECT COUNT(*)::BIGINT {FROM_JOINED} {clause}");
        let q = bind_values_scalar(sqlx::query_scalar::<_, i64>(&query), &bind_values);
        q.bind(since).fetch_one(pool).await
    }

    /// Distinct actor count since `since`. NULL actors are not counted.
    async fn distinct_actors_window(
        pool: &PgPool,
        params: &EventRecordQuery,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values, bind_idx) = build_event_filter(params);
        let clause = append_condition(&where_clause, &format!("e.created_at >= ${bind_idx}"));

        let query = format!("SELECT COUNT(DISTINCT e.actor_id)::BIGINT {FROM_JOINED} {clause}");
        let q = bind_values_scalar(sqlx::query_scalar::<_, i64>(&query), &bind_values);
        q.bind(since).fetch_one(pool).await
    }

    /// Newest 10 records, summarized.
    async fn recent_summaries(
        pool: &PgPool,
        params: &EventRecordQuery,
    ) -> Result<Vec<EventRecordSummary>, sqlx::Error> {
        let (where_clause, bind_values, _) = build_event_filter(params);

        let query = format!(
            "SELECT e.id, e.action, e.actor_id, u.email AS actor_email, \
                    e.subject_table, e.description, e.created_at \
             {FROM_JOINED} {where_clause} \
             ORDER BY e.created_at DESC, e.id DESC LIMIT 10"
        );
        let q = bind_values_as(sqlx::query_as::<_, EventRecordSummary>(&query), &bind_values);
        q.fetch_all(pool).await
    }

    /// Counts grouped by action kind since `since`, largest first.
    async fn counts_by_action(
        pool: &PgPool,
        params: &EventRecordQuery,
        since: Timestamp,
    ) -> Result<Vec<ActionCount>, sqlx::Error> {
        let (where_clause, bind_values, bind_idx) = build_event_filter(params);
        let clause = append_condition(&where_clause, &format!("e.created_at >= ${bind_idx}"));

        let query = format!(
            "SELECT e.action, COUNT(*)::BIGINT AS count {FROM_JOINED} {clause} \
             GROUP BY e.action ORDER BY count DESC, e.action ASC"
        );
        let q = bind_values_as(sqlx::query_as::<_, ActionCount>(&query), &bind_values);
        q.bind(since).fetch_all(pool).await
    }

    /// Top 5 actors by record count since `since`.
    async fn top_actors(
        pool: &PgPool,
        params: &EventRecordQuery,
        since: Timestamp,
    ) -> Result<Vec<ActorCount>, sqlx::Error> {
        let (where_clause, bind_values, bind_idx) = build_event_filter(params);
        let mut clause = append_condition(&where_clause, &format!("e.created_at >= ${bind_idx}"));
        clause = append_condition(&clause, "e.actor_id IS NOT NULL");

        let query = format!(
            "SELECT e.actor_id, u.username, u.email, COUNT(*)::BIGINT AS count \
             {FROM_JOINED} {clause} \
             GROUP BY e.actor_id, u.username, u.email \
             ORDER BY count DESC, e.actor_id ASC LIMIT 5"
        );
        let q = bind_values_as(sqlx::query_as::<_, ActorCount>(&query), &bind_values);
        q.bind(since).fetch_all(pool).await
    }

    /// 24 hourly buckets covering `[now - 24h, now)`, oldest first.
    ///
    /// Bucket upper bounds are exclusive, so the bucket counts sum exactly
    /// to the 24-hour total for the same filter.
    async fn hourly_timeline(
        pool: &PgPool,
        params: &EventRecordQuery,
        now: Timestamp,
    ) -> Result<Vec<TimelineBucket>, sqlx::Error> {
        let start = now - Duration::hours(24);

        let (where_clause, bind_values, bind_idx) = build_event_filter(params);
        let clause = append_condition(
            &where_clause,
            &format!(
                "e.created_at >= ${bind_idx} AND e.created_at < ${}",
                bind_idx + 1
            ),
        );

        let query = format!(
            "SELECT FLOOR(EXTRACT(EPOCH FROM (e.created_at - ${bind_idx})) / 3600)::BIGINT AS bucket, \
                    COUNT(*)::BIGINT AS count \
             {FROM_JOINED} {clause} \
             GROUP BY bucket ORDER BY bucket ASC"
        );

        let q = bind_values_as(sqlx::query_as::<_, (i64, i64)>(&query), &bind_values);
        let rows = q.bind(start).bind(now).fetch_all(pool).await?;

        let mut buckets = Vec::with_capacity(24);
        for hour in 0..24 {
            let count = rows
                .iter()
                .find(|(bucket, _)| *bucket == hour)
                .map(|(_, count)| *count)
                .unwrap_or(0);
            buckets.push(TimelineBucket {
                bucket_start: start + Duration::hours(hour),
                count,
            });
        }
        Ok(buckets)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers for dynamic query building
// ---------------------------------------------------------------------------

fn insert_query() -> String {
    format!(
        "INSERT INTO event_records ({INSERT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING {COLUMNS}"
    )
}

fn bind_create<'q>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, EventRecord, sqlx::postgres::PgArguments>,
    input: &'q CreateEventRecord,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, EventRecord, sqlx::postgres::PgArguments> {
    q.bind(input.actor_id)
        .bind(input.action.as_str())
        .bind(&input.subject_table)
        .bind(input.subject_id)
        .bind(&input.before_state)
        .bind(&input.after_state)
        .bind(&input.description)
        .bind(&input.ip_address)
        .bind(&input.user_agent)
        .bind(&input.session_id)
        .bind(&input.http_method)
        .bind(&input.path)
        .bind(input.status_code)
}

/// Typed bind value for dynamically-built event record queries.
enum BindValue {
    BigInt(i64),
    Text(String),
    TextArray(Vec<String>),
    Timestamp(Timestamp),
}

/// Render a fixed kind set as a quoted SQL list. Values come from
/// [`ActionKind::as_str`], never from user input.
fn quoted_kinds(kinds: &[ActionKind]) -> String {
    kinds
        .iter()
        .map(|k| format!("'{}'", k.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Extend a WHERE clause (possibly empty) with one more AND condition.
fn append_condition(where_clause: &str, condition: &str) -> String {
    if where_clause.is_empty() {
        format!("WHERE {condition}")
    } else {
        format!("{where_clause} AND {condition}")
    }
}

/// Build a WHERE clause and bind values from `EventRecordQuery` filters.
///
/// Returns `(where_clause, bind_values, next_bind_index)`. The clause is
/// empty when no filters are active, or starts with `WHERE `. Conditions
/// reference the joined aliases `e` / `u`.
fn build_event_filter(params: &EventRecordQuery) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;
    let mut bind_values: Vec<BindValue> = Vec::new();

    if let Some(actor_id) = params.actor_id {
        conditions.push(format!("e.actor_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::BigInt(actor_id));
    }

    if !params.actions.is_empty() {
        conditions.push(format!("e.action = ANY(${bind_idx})"));
        bind_idx += 1;
        bind_values.push(BindValue::TextArray(
            params.actions.iter().map(|k| k.as_str().to_string()).collect(),
        ));
    }

    if let Some(ref subject_table) = params.subject_table {
        conditions.push(format!("e.subject_table ILIKE ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(format!("%{subject_table}%")));
    }

    if let Some(ref ip_address) = params.ip_address {
        conditions.push(format!("e.ip_address = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(ip_address.clone()));
    }

    if let Some(from) = params.from {
        conditions.push(format!("e.created_at >= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(from));
    }

    if let Some(to) = params.to {
        conditions.push(format!("e.created_at <= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(to));
    }

    if let Some(ref search) = params.search {
        let pattern = format!("%{search}%");
        conditions.push(format!(
            "(e.description ILIKE ${bind_idx} \
              OR e.subject_table ILIKE ${} \
              OR COALESCE(u.email, '') ILIKE ${} \
              OR COALESCE(e.ip_address, '') ILIKE ${})",
            bind_idx + 1,
            bind_idx + 2,
            bind_idx + 3
        ));
        bind_idx += 4;
        for _ in 0..4 {
            bind_values.push(BindValue::Text(pattern.clone()));
        }
    }

    if params.security_only {
        conditions.push(format!(
            "e.action IN ({})",
            quoted_kinds(&ActionKind::SECURITY_RELEVANT)
        ));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values, bind_idx)
}

/// Bind a slice of `BindValue` to a sqlx `QueryAs`.
fn bind_values_as<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::TextArray(v) => q = q.bind(v.as_slice()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}

/// Bind a slice of `BindValue` to a sqlx `QueryScalar`.
fn bind_values_scalar<'q>(
    mut q: sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::TextArray(v) => q = q.bind(v.as_slice()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}
