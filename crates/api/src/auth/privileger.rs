//! Projects `Ws-Privileges` grants onto organization access.

use std::sync::Arc;

use sourcegate_audit::{params, Actor, AuditSink, EventKind, Status};
use sourcegate_db::models::user::User;

use super::error::AuthError;
use super::privileges::PrivilegesByTenant;
use super::store::PrivilegeStore;

pub struct Privileger {
    store: Arc<dyn PrivilegeStore>,
    audit: AuditSink,
}

impl Privileger {
    pub fn new(store: Arc<dyn PrivilegeStore>, audit: AuditSink) -> Self {
        Self { store, audit }
    }

    /// Grant `user` the strongest mode per organization of `tenant_name`
    /// found in `privileges`.
    ///
    /// An empty tenant name is a no-op. Grants naming organizations the
    /// tenant does not have are ignored as long as one of them matches.
    pub async fn apply(
        &self,
        user: &User,
        tenant_name: &str,
        privileges: &PrivilegesByTenant,
        remote_addr: &str,
    ) -> Result<(), AuthError> {
        if tenant_name.is_empty() {
            return Ok(());
        }

        let outcome = self.grant_all(user, tenant_name, privileges).await;

        let mut audit_params = params([("tenant", tenant_name)]);
        match &outcome {
            Ok(granted) => {
                audit_params.insert("organizations".into(), granted.join(","));
            }
            Err(e) => {
                audit_params.insert("error".into(), e.to_string());
            }
        }
        self.audit.emit(
            EventKind::PrivilegesGrant,
            &Actor::new(&user.name, user.id),
            Status::from_ok(outcome.is_ok()),
            remote_addr,
            audit_params,
        );

        outcome.map(|_| ())
    }

    async fn grant_all(
        &self,
        user: &User,
        tenant_name: &str,
        privileges: &PrivilegesByTenant,
    ) -> Result<Vec<String>, AuthError> {
        let tenant = self
            .store
            .find_tenant(tenant_name)
            .await?
            .ok_or_else(|| AuthError::TenantNotFound(tenant_name.to_string()))?;

        let projects = privileges.project_names(&tenant.org_key);
        let organizations = self.store.find_organizations(tenant.id, &projects).await?;
        if organizations.is_empty() {
            return Err(AuthError::OrganizationNotFound(projects.join(",")));
        }

        let modes = privileges.max_modes(&tenant.org_key);
        let mut granted = Vec::with_capacity(organizations.len());
        for organization in organizations {
            let Some(mode) = modes.get(&organization.lower_name) else {
                continue;
            };
            self.store
                .grant(organization.id, user.id, *mode)
                .await
                .map_err(|e| AuthError::ApplyPrivileges(e.to_string()))?;
            tracing::debug!(
                user = %user.login_name,
                organization = %organization.name,
                mode = %mode,
                "Organization access granted"
            );
            granted.push(organization.lower_name);
        }
        Ok(granted)
    }
}
