//! Repositories for the `organizations` and `organization_access` tables.

use sqlx::PgPool;
use sourcegate_core::roles::AccessMode;
use sourcegate_core::types::DbId;

use crate::models::organization::{Organization, OrganizationAccess};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, tenant_id, name, lower_name, is_active, created_at";

const ACCESS_COLUMNS: &str = "organization_id, user_id, access_mode, updated_at";

pub struct OrganizationRepo;

impl OrganizationRepo {
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        name: &str,
    ) -> Result<Organization, sqlx::Error> {
        let query = format!(
            "INSERT INTO organizations (tenant_id, name, lower_name)
             VALUES ($1, $2, LOWER($2))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Organization>(&query)
            .bind(tenant_id)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    /// Active organizations of `tenant_id` whose name matches one of `names`,
    /// compared case-insensitively.
    pub async fn find_active_by_names(
        pool: &PgPool,
        tenant_id: DbId,
        names: &[String],
    ) -> Result<Vec<Organization>, sqlx::Error> {
        let lower: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let query = format!(
            "SELECT {COLUMNS} FROM organizations
             WHERE tenant_id = $1 AND is_active AND lower_name = ANY($2)
             ORDER BY lower_name ASC"
        );
        sqlx::query_as::<_, Organization>(&query)
            .bind(tenant_id)
            .bind(&lower)
            .fetch_all(pool)
            .await
    }
}

pub struct OrganizationAccessRepo;

impl OrganizationAccessRepo {
    /// Insert or replace the access mode of `user_id` in `organization_id`.
    pub async fn upsert(
        pool: &PgPool,
        organization_id: DbId,
        user_id: DbId,
        mode: AccessMode,
    ) -> Result<OrganizationAccess, sqlx::Error> {
        let query = format!(
            "INSERT INTO organization_access (organization_id, user_id, access_mode)
             VALUES ($1, $2, $3)
             ON CONFLICT (organization_id, user_id)
             DO UPDATE SET access_mode = EXCLUDED.access_mode, updated_at = NOW()
             RETURNING {ACCESS_COLUMNS}"
        );
        sqlx::query_as::<_, OrganizationAccess>(&query)
            .bind(organization_id)
            .bind(user_id)
            .bind(mode.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<OrganizationAccess>, sqlx::Error> {
        let query = format!(
            "SELECT {ACCESS_COLUMNS} FROM organization_access
             WHERE user_id = $1 ORDER BY organization_id ASC"
        );
        sqlx::query_as::<_, OrganizationAccess>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
