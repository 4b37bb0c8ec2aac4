//! Repository for the `tenants` table.

use sqlx::PgPool;

use crate::models::tenant::Tenant;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, org_key, is_active, created_at";

pub struct TenantRepo;

impl TenantRepo {
    pub async fn create(pool: &PgPool, name: &str, org_key: &str) -> Result<Tenant, sqlx::Error> {
        let query = format!(
            "INSERT INTO tenants (name, org_key) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(name)
            .bind(org_key)
            .fetch_one(pool)
            .await
    }

    /// Find an active tenant by name.
    pub async fn find_active_by_name(pool: &PgPool, name: &str) -> Result<Option<Tenant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tenants WHERE name = $1 AND is_active");
        sqlx::query_as::<_, Tenant>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }
}
