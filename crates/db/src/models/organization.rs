//! Organization and organization access models.

use serde::Serialize;
use sqlx::FromRow;
use sourcegate_core::types::{DbId, Timestamp};

/// A row from the `organizations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Organization {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub lower_name: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}

/// A row from the `organization_access` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrganizationAccess {
    pub organization_id: DbId,
    pub user_id: DbId,
    pub access_mode: String,
    pub updated_at: Timestamp,
}
