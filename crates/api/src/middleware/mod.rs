//! Authentication middleware and authorization extractors.
//!
//! - [`auth::authenticate`] -- Resolves the caller and attaches [`crate::auth::AuthUser`].
//! - [`auth::ClientAddr`] -- Remote address used in audit records.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.

pub mod auth;
pub mod rbac;
