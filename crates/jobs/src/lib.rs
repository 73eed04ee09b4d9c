//! Scheduler-invoked batch jobs.
//!
//! Three maintenance passes over the database, each safe to re-run and safe
//! to overlap with live API traffic:
//!
//! - [`rules`] — advance active workflow instances along satisfied
//!   transitions.
//! - [`escalation`] — detect stages that exceeded their duration budget and
//!   record escalations exactly once per stage entry.
//! - [`purge`] — delete audit records past the retention window.
//!
//! The admin API calls the same entry points in-process; the `mdc-jobs`
//! binary wraps them for cron.

pub mod escalation;
pub mod purge;
pub mod rules;
