//! Shared type aliases used across the workspace.

/// Database primary-key type used across all entities.
pub type DbId = i64;

/// Timestamp type used across all entities (UTC).
pub type Timestamp = chrono::DateTime<chrono::Utc>;
