//! Event record entity models and DTOs.
//!
//! Models for the append-only audit log. Event records have no `updated_at`
//! field and no update DTO: once appended they only ever leave the table
//! through retention pruning or administrative cleanup.

use serde::Serialize;
use sqlx::FromRow;

use mdc_core::action::ActionKind;
use mdc_core::subject::SubjectKind;
use mdc_core::types::{DbId, Timestamp};

/// Default page size for event record listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Hard cap on the page size for event record listings.
pub const MAX_PAGE_SIZE: i64 = 200;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A single event record. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRecord {
    pub id: DbId,
    pub actor_id: Option<DbId>,
    pub action: String,
    pub subject_table: String,
    pub subject_id: Option<DbId>,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub http_method: Option<String>,
    pub path: Option<String>,
    pub status_code: Option<i32>,
    pub created_at: Timestamp,
}

/// An event record joined with its actor's identity, as returned by list
/// and detail queries.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRecordWithActor {
    pub id: DbId,
    pub actor_id: Option<DbId>,
    pub actor_username: Option<String>,
    pub actor_email: Option<String>,
    pub action: String,
    pub subject_table: String,
    pub subject_id: Option<DbId>,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub http_method: Option<String>,
    pub path: Option<String>,
    pub status_code: Option<i32>,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// DTO for appending a new event record.
///
/// Only the action kind is mandatory; everything else is attached through
/// the builder methods by whichever component is doing the logging.
#[derive(Debug, Clone)]
pub struct CreateEventRecord {
    pub action: ActionKind,
    pub actor_id: Option<DbId>,
    pub subject_table: String,
    pub subject_id: Option<DbId>,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub http_method: Option<String>,
    pub path: Option<String>,
    pub status_code: Option<i32>,
}

impl CreateEventRecord {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            actor_id: None,
            subject_table: String::new(),
            subject_id: None,
            before_state: None,
            after_state: None,
            description: String::new(),
            ip_address: None,
            user_agent: None,
            session_id: None,
            http_method: None,
            path: None,
            status_code: None,
        }
    }

    pub fn with_actor(mut self, actor_id: DbId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Point the record at a concrete subject row.
    pub fn with_subject(mut self, kind: SubjectKind, id: DbId) -> Self {
        self.subject_table = kind.table_name().to_string();
        self.subject_id = Some(id);
        self
    }

    /// Tag the record with a subject kind that has no row of its own
    /// (middleware-originated records use [`SubjectKind::Request`]).
    pub fn with_subject_kind(mut self, kind: SubjectKind) -> Self {
        self.subject_table = kind.table_name().to_string();
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Attach before/after snapshots; meaningful for mutation kinds only.
    pub fn with_states(
        mut self,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        self.before_state = before;
        self.after_state = after;
        self
    }

    pub fn with_client(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip;
        self.user_agent = user_agent;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_http(mut self, method: impl Into<String>, path: impl Into<String>, status: u16) -> Self {
        self.http_method = Some(method.into());
        self.path = Some(path.into());
        self.status_code = Some(status as i32);
        self
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Filter parameters for querying event records.
///
/// All filters combine with AND. `actions` empty means "any kind";
/// `security_only` restricts to the security-relevant kinds on top of any
/// explicit action filter.
#[derive(Debug, Clone, Default)]
pub struct EventRecordQuery {
    pub actions: Vec<ActionKind>,
    pub actor_id: Option<DbId>,
    /// Substring match on the subject table name.
    pub subject_table: Option<String>,
    /// Exact match on the recorded client IP.
    pub ip_address: Option<String>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    /// Free-text search over description, subject table, actor email and IP.
    pub search: Option<String>,
    pub security_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Paginated response for event record queries.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecordPage {
    pub items: Vec<EventRecordWithActor>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Count of records per action kind.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActionCount {
    pub action: String,
    pub count: i64,
}

/// Count of records per actor.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActorCount {
    pub actor_id: DbId,
    pub username: String,
    pub email: String,
    pub count: i64,
}

/// One hourly bucket of the activity timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineBucket {
    /// Inclusive lower bound of the bucket; the upper bound is one hour
    /// later, exclusive.
    pub bucket_start: Timestamp,
    pub count: i64,
}

/// Abbreviated record used in the recent-activity list.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRecordSummary {
    pub id: DbId,
    pub action: String,
    pub actor_id: Option<DbId>,
    pub actor_email: Option<String>,
    pub subject_table: String,
    pub description: String,
    pub created_at: Timestamp,
}

/// The point-in-time statistics object.
///
/// All windows are computed against the single `now` the caller passed in,
/// over the same filtered/role-restricted record set.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    /// Records in the last 30 days.
    pub total_events: i64,
    /// Distinct actors in the last 7 days.
    pub active_actors: i64,
    /// Security alerts in the last 24 hours.
    pub security_alerts: i64,
    pub system_health: &'static str,
    /// Newest 10 records.
    pub recent_activities: Vec<EventRecordSummary>,
    /// Counts per action kind over the last 7 days, largest first.
    pub activity_by_action: Vec<ActionCount>,
    /// Top 5 actors over the last 7 days.
    pub activity_by_user: Vec<ActorCount>,
    /// 24 hourly buckets covering the last 24 hours, oldest first.
    pub activity_timeline: Vec<TimelineBucket>,
}
