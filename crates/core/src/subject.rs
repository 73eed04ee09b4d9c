//! Subject kinds for polymorphic audit references.
//!
//! An event record points at its subject twice: a loose
//! `(subject_table, subject_id)` pair that survives the subject's deletion,
//! and a resolved summary looked up on demand. Resolution is an explicit
//! lookup by `(kind, id)` through the registry in `mdc-db`, keyed by this
//! enum rather than an open-ended table name.

use serde::{Deserialize, Serialize};

/// The kinds of business entities an event record can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// A bare HTTP exchange logged by the ingestion middleware.
    Request,
    User,
    Transaction,
    WorkflowTemplate,
    WorkflowInstance,
    Notification,
    EventRecord,
}

impl SubjectKind {
    pub const ALL: [SubjectKind; 7] = [
        SubjectKind::Request,
        SubjectKind::User,
        SubjectKind::Transaction,
        SubjectKind::WorkflowTemplate,
        SubjectKind::WorkflowInstance,
        SubjectKind::Notification,
        SubjectKind::EventRecord,
    ];

    /// The value stored in `event_records.subject_table`.
    pub fn table_name(self) -> &'static str {
        match self {
            SubjectKind::Request => "request",
            SubjectKind::User => "user",
            SubjectKind::Transaction => "transaction",
            SubjectKind::WorkflowTemplate => "workflow_template",
            SubjectKind::WorkflowInstance => "workflow_instance",
            SubjectKind::Notification => "notification",
            SubjectKind::EventRecord => "event_record",
        }
    }

    /// Reverse lookup from the stored table name.
    pub fn from_table_name(value: &str) -> Option<SubjectKind> {
        SubjectKind::ALL.iter().copied().find(|k| k.table_name() == value)
    }
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}
