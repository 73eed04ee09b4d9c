//! Well-known role name constants.
//!
//! These must match the seed data in `20260301000001_create_roles_and_users.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_EDITOR: &str = "editor";
pub const ROLE_CLIENT: &str = "client";

/// Every role name known to the system, in seed order.
pub const ALL_ROLES: [&str; 3] = [ROLE_ADMIN, ROLE_EDITOR, ROLE_CLIENT];

/// Whether `name` is one of the seeded role names.
pub fn is_valid_role(name: &str) -> bool {
    ALL_ROLES.contains(&name)
}
