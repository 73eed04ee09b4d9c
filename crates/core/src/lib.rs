//! Domain types and pure business logic for the MDC tracking backend.
//!
//! Nothing in this crate performs I/O. Audit action kinds, the request
//! classification chain, workflow state-machine rules, and the shared error
//! taxonomy live here so they can be unit-tested in isolation and reused by
//! the API, the repositories, and the batch jobs.

pub mod action;
pub mod classify;
pub mod error;
pub mod roles;
pub mod subject;
pub mod types;
pub mod workflow;
