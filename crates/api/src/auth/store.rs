//! Storage seams for identities and organization grants.
//!
//! [`PgDirectory`] is the production backend. [`MemoryDirectory`] keeps
//! everything in process and backs the tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use sourcegate_core::roles::AccessMode;
use sourcegate_core::types::{DbId, UnixTime};
use sourcegate_db::models::organization::Organization;
use sourcegate_db::models::tenant::Tenant;
use sourcegate_db::models::user::{CreateUser, User};
use sourcegate_db::repositories::{
    OrganizationAccessRepo, OrganizationRepo, TenantRepo, UserRepo,
};
use sourcegate_db::DbPool;

use super::error::AuthError;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, AuthError>;

    async fn create(&self, input: &CreateUser) -> Result<User, AuthError>;

    async fn set_admin(&self, id: DbId, is_admin: bool) -> Result<(), AuthError>;

    async fn set_last_login(&self, id: DbId, at: UnixTime) -> Result<(), AuthError>;
}

#[async_trait]
pub trait PrivilegeStore: Send + Sync {
    async fn find_tenant(&self, name: &str) -> Result<Option<Tenant>, AuthError>;

    /// Active organizations of the tenant matching `names` case-insensitively.
    async fn find_organizations(
        &self,
        tenant_id: DbId,
        names: &[String],
    ) -> Result<Vec<Organization>, AuthError>;

    async fn grant(
        &self,
        organization_id: DbId,
        user_id: DbId,
        mode: AccessMode,
    ) -> Result<(), AuthError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgDirectory {
    pool: DbPool,
}

impl PgDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgDirectory {
    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<User>, AuthError> {
        Ok(UserRepo::find_by_login_name(&self.pool, login_name).await?)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, AuthError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn create(&self, input: &CreateUser) -> Result<User, AuthError> {
        Ok(UserRepo::create(&self.pool, input).await?)
    }

    async fn set_admin(&self, id: DbId, is_admin: bool) -> Result<(), AuthError> {
        Ok(UserRepo::set_admin(&self.pool, id, is_admin).await?)
    }

    async fn set_last_login(&self, id: DbId, at: UnixTime) -> Result<(), AuthError> {
        Ok(UserRepo::set_last_login(&self.pool, id, at).await?)
    }
}

#[async_trait]
impl PrivilegeStore for PgDirectory {
    async fn find_tenant(&self, name: &str) -> Result<Option<Tenant>, AuthError> {
        Ok(TenantRepo::find_active_by_name(&self.pool, name).await?)
    }

    async fn find_organizations(
        &self,
        tenant_id: DbId,
        names: &[String],
    ) -> Result<Vec<Organization>, AuthError> {
        Ok(OrganizationRepo::find_active_by_names(&self.pool, tenant_id, names).await?)
    }

    async fn grant(
        &self,
        organization_id: DbId,
        user_id: DbId,
        mode: AccessMode,
    ) -> Result<(), AuthError> {
        OrganizationAccessRepo::upsert(&self.pool, organization_id, user_id, mode).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Directory {
    next_id: DbId,
    users: BTreeMap<DbId, User>,
    tenants: Vec<Tenant>,
    organizations: Vec<Organization>,
    grants: BTreeMap<(DbId, DbId), AccessMode>,
    last_login_writes: usize,
}

impl Directory {
    fn allocate(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct MemoryDirectory {
    inner: Arc<Mutex<Directory>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Directory> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_tenant(&self, name: &str, org_key: &str) -> Tenant {
        let mut dir = self.lock();
        let tenant = Tenant {
            id: dir.allocate(),
            name: name.to_string(),
            org_key: org_key.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        dir.tenants.push(tenant.clone());
        tenant
    }

    pub fn add_organization(&self, tenant_id: DbId, name: &str, is_active: bool) -> Organization {
        let mut dir = self.lock();
        let organization = Organization {
            id: dir.allocate(),
            tenant_id,
            name: name.to_string(),
            lower_name: name.to_lowercase(),
            is_active,
            created_at: Utc::now(),
        };
        dir.organizations.push(organization.clone());
        organization
    }

    pub fn user(&self, login_name: &str) -> Option<User> {
        self.lock()
            .users
            .values()
            .find(|u| u.login_name == login_name)
            .cloned()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    /// Access mode of `user_id` in `organization_id`, if granted.
    pub fn grant_of(&self, organization_id: DbId, user_id: DbId) -> Option<AccessMode> {
        self.lock().grants.get(&(organization_id, user_id)).copied()
    }

    pub fn grant_count(&self) -> usize {
        self.lock().grants.len()
    }

    /// How many times `last_login_unix` was written.
    pub fn last_login_writes(&self) -> usize {
        self.lock().last_login_writes
    }

    /// Move the user's last login back by `secs`.
    pub fn age_last_login(&self, login_name: &str, secs: i64) {
        let mut dir = self.lock();
        if let Some(user) = dir.users.values_mut().find(|u| u.login_name == login_name) {
            user.last_login_unix -= secs;
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryDirectory {
    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<User>, AuthError> {
        Ok(self.user(login_name))
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, AuthError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn create(&self, input: &CreateUser) -> Result<User, AuthError> {
        let mut dir = self.lock();
        let now = Utc::now();
        let user = User {
            id: dir.allocate(),
            login_name: input.login_name.clone(),
            name: input.name.clone(),
            full_name: input.full_name.clone(),
            email: input.email.clone(),
            login_type: input.login_type.as_str().to_string(),
            is_admin: input.is_admin,
            is_active: true,
            password_hash: input.password_hash.clone(),
            last_login_unix: 0,
            created_at: now,
            updated_at: now,
        };
        dir.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_admin(&self, id: DbId, is_admin: bool) -> Result<(), AuthError> {
        if let Some(user) = self.lock().users.get_mut(&id) {
            user.is_admin = is_admin;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_last_login(&self, id: DbId, at: UnixTime) -> Result<(), AuthError> {
        let mut dir = self.lock();
        dir.last_login_writes += 1;
        if let Some(user) = dir.users.get_mut(&id) {
            user.last_login_unix = at;
        }
        Ok(())
    }
}

#[async_trait]
impl PrivilegeStore for MemoryDirectory {
    async fn find_tenant(&self, name: &str) -> Result<Option<Tenant>, AuthError> {
        Ok(self
            .lock()
            .tenants
            .iter()
            .find(|t| t.name == name && t.is_active)
            .cloned())
    }

    async fn find_organizations(
        &self,
        tenant_id: DbId,
        names: &[String],
    ) -> Result<Vec<Organization>, AuthError> {
        let lower: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let mut found: Vec<Organization> = self
            .lock()
            .organizations
            .iter()
            .filter(|o| o.tenant_id == tenant_id && o.is_active && lower.contains(&o.lower_name))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.lower_name.cmp(&b.lower_name));
        Ok(found)
    }

    async fn grant(
        &self,
        organization_id: DbId,
        user_id: DbId,
        mode: AccessMode,
    ) -> Result<(), AuthError> {
        self.lock().grants.insert((organization_id, user_id), mode);
        Ok(())
    }
}
