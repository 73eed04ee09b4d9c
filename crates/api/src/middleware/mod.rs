//! Authentication, authorization, and audit middleware.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`auth::RequestMeta`] -- Extracts client IP and user agent from headers.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.
//! - [`rbac::RequireEditor`] -- Requires `editor` or `admin` role.
//! - [`audit_trail`] -- Classifies completed exchanges into audit records.

pub mod audit_trail;
pub mod auth;
pub mod rbac;
