//! Row structs and create DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and, where rows are inserted by the service, a create DTO.

pub mod cron_lock;
pub mod organization;
pub mod tenant;
pub mod user;
