//! Entity models and DTOs, one module per table group.

pub mod event_record;
pub mod notification;
pub mod role;
pub mod session;
pub mod transaction;
pub mod user;
pub mod workflow;
