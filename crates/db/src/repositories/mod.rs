//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod cron_lock_repo;
pub mod organization_repo;
pub mod tenant_repo;
pub mod user_repo;

pub use cron_lock_repo::CronJobLockRepo;
pub use organization_repo::{OrganizationAccessRepo, OrganizationRepo};
pub use tenant_repo::TenantRepo;
pub use user_repo::UserRepo;
