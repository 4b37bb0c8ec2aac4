//! Tenant model.

use serde::Serialize;
use sqlx::FromRow;
use sourcegate_core::types::{DbId, Timestamp};

/// A row from the `tenants` table.
///
/// `org_key` is the organization identifier the identity provider uses for
/// this tenant in privilege grants.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tenant {
    pub id: DbId,
    pub name: String,
    pub org_key: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}
