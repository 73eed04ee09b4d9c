//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument; helpers that must join an open
//! transaction take `&mut Transaction` instead and are suffixed `_in_tx`.

pub mod escalation_repo;
pub mod event_record_repo;
pub mod notification_repo;
pub mod role_repo;
pub mod session_repo;
pub mod subject_registry;
pub mod transaction_repo;
pub mod user_repo;
pub mod workflow_instance_repo;
pub mod workflow_template_repo;

pub use escalation_repo::EscalationRepo;
pub use event_record_repo::EventRecordRepo;
pub use notification_repo::NotificationRepo;
pub use role_repo::RoleRepo;
pub use session_repo::SessionRepo;
pub use subject_registry::{resolve_subject, SubjectSummary};
pub use transaction_repo::TransactionRepo;
pub use user_repo::UserRepo;
pub use workflow_instance_repo::WorkflowInstanceRepo;
pub use workflow_template_repo::WorkflowTemplateRepo;
