//! Identity-provider proxy mode.
//!
//! A request carries `Authorization: Bearer <jwt>` issued by the identity
//! provider and, unless it is a git transport request, a `Ws-Privileges`
//! header. The token subject is reconciled with a local identity and the
//! privileges are projected onto organization access at most once per
//! cache window.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use sourcegate_audit::{params, Actor, AuditSink, EventKind, Status};
use sourcegate_core::config::Settings;
use sourcegate_core::error::CoreError;
use sourcegate_core::types::now_unix;
use sourcegate_db::models::user::{CreateUser, LoginType, User};

use super::claims::{bearer_token, parse_unverified, IamClaims};
use super::error::AuthError;
use super::privileger::Privileger;
use super::privileges::{self, PrivilegesByTenant};
use super::roles::{resolve_role, ResolvedRole, RoleWhitelists};
use super::store::{IdentityStore, PrivilegeStore};

pub const SECTION: &str = "iam";
pub const GIT_PROTOCOL_HEADER: &str = "Git-Protocol";

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
const DEFAULT_TOOL_NAME: &str = "sc";

#[derive(Debug, Clone)]
pub struct IamConfig {
    pub enabled: bool,
    /// How long projected privileges stay valid after a login.
    pub cache_ttl: Duration,
    pub whitelists: RoleWhitelists,
    pub ws_privileges_enabled: bool,
    /// Only grants for this tool are projected.
    pub tool_name: String,
}

impl Default for IamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            whitelists: RoleWhitelists::default(),
            ws_privileges_enabled: true,
            tool_name: DEFAULT_TOOL_NAME.to_string(),
        }
    }
}

impl IamConfig {
    /// | Key                                  | Default |
    /// |--------------------------------------|---------|
    /// | `ENABLED`                            | `false` |
    /// | `CASBIN_CACHE_UPDATE_TTL_IN_SECONDS` | `30`    |
    /// | `WHITE_LIST_ROLES_USER`              | empty   |
    /// | `WHITE_LIST_ROLES_ADMIN`             | empty   |
    /// | `WS_PRIVILEGES_ENABLED`              | `true`  |
    /// | `IAM_TOOL_NAME`                      | `sc`    |
    pub fn from_settings(settings: &Settings) -> Result<Self, CoreError> {
        let section = settings.section(SECTION);
        let ttl_secs: u64 =
            section.parse_or("CASBIN_CACHE_UPDATE_TTL_IN_SECONDS", DEFAULT_CACHE_TTL.as_secs())?;
        Ok(Self {
            enabled: section.bool_or("ENABLED", false)?,
            cache_ttl: Duration::from_secs(ttl_secs),
            whitelists: RoleWhitelists {
                user: section.list("WHITE_LIST_ROLES_USER"),
                admin: section.list("WHITE_LIST_ROLES_ADMIN"),
            },
            ws_privileges_enabled: section.bool_or("WS_PRIVILEGES_ENABLED", true)?,
            tool_name: section.string_or("IAM_TOOL_NAME", DEFAULT_TOOL_NAME),
        })
    }
}

pub struct IamProxy {
    config: IamConfig,
    identities: Arc<dyn IdentityStore>,
    privileger: Privileger,
    audit: AuditSink,
}

impl IamProxy {
    pub fn new(
        config: IamConfig,
        identities: Arc<dyn IdentityStore>,
        privileges: Arc<dyn PrivilegeStore>,
        audit: AuditSink,
    ) -> Self {
        Self {
            config,
            identities,
            privileger: Privileger::new(privileges, audit.clone()),
            audit,
        }
    }

    pub fn config(&self) -> &IamConfig {
        &self.config
    }

    /// Authenticate the request and return the reconciled local identity.
    ///
    /// [`AuthError::IncorrectTokenType`] means the request carries no IAM
    /// token; the caller may try another method.
    pub async fn verify(&self, headers: &HeaderMap, remote_addr: &str) -> Result<User, AuthError> {
        let claims = parse_unverified(bearer_token(headers)?)?;

        let resolved = resolve_role(
            claims.groups(),
            &self.config.whitelists,
            self.config.ws_privileges_enabled,
        )?;

        // Git transport requests carry no privileges header and never
        // refresh the privilege cache.
        let git_protocol = headers.contains_key(GIT_PROTOCOL_HEADER);
        let ws_privileges = self.config.ws_privileges_enabled && !git_protocol;
        if ws_privileges && claims.organization.is_empty() {
            return Err(AuthError::ParseIamJwt("claim organization does not exist".into()));
        }

        let user = self.reconcile(&claims, resolved, remote_addr).await?;
        if !ws_privileges {
            return Ok(user);
        }

        let privileges = headers
            .get(privileges::HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError::ParsePrivileges(format!("{} header is missing", privileges::HEADER)))
            .and_then(|raw| PrivilegesByTenant::parse(raw, &self.config.tool_name))?;

        let now = now_unix();
        let ttl = self.config.cache_ttl.as_secs() as i64;
        if now - user.last_login_unix <= ttl {
            tracing::debug!(user = %user.login_name, "Privileges cached, skipping projection");
            return Ok(user);
        }

        self.privileger
            .apply(&user, &claims.organization, &privileges, remote_addr)
            .await
            .map_err(|e| match e {
                AuthError::TenantNotFound(_)
                | AuthError::OrganizationNotFound(_)
                | AuthError::ApplyPrivileges(_) => e,
                other => AuthError::ApplyPrivileges(other.to_string()),
            })?;

        self.identities.set_last_login(user.id, now).await?;
        Ok(User {
            last_login_unix: now,
            ..user
        })
    }

    async fn reconcile(
        &self,
        claims: &IamClaims,
        resolved: ResolvedRole,
        remote_addr: &str,
    ) -> Result<User, AuthError> {
        let is_admin = resolved.role.is_admin();

        let Some(mut user) = self.identities.find_by_login_name(&claims.sub).await? else {
            return self.provision(claims, is_admin, remote_addr).await;
        };

        if resolved.groups_present && user.is_admin != is_admin {
            self.identities.set_admin(user.id, is_admin).await?;
            tracing::info!(user = %user.login_name, is_admin, "Admin flag reconciled from groups");
            user.is_admin = is_admin;
        }
        Ok(user)
    }

    async fn provision(
        &self,
        claims: &IamClaims,
        is_admin: bool,
        remote_addr: &str,
    ) -> Result<User, AuthError> {
        let input = CreateUser {
            login_name: claims.sub.clone(),
            name: claims.preferred_username.clone(),
            full_name: claims.full_name(),
            email: claims.email.clone(),
            login_type: LoginType::Iam,
            is_admin,
            password_hash: None,
        };
        let outcome = self.identities.create(&input).await;

        let mut audit_params = params([("login_name", input.login_name.as_str())]);
        let actor = match &outcome {
            Ok(user) => Actor::new(&user.name, user.id),
            Err(e) => {
                audit_params.insert("error".into(), e.to_string());
                Actor::new(&input.name, "-")
            }
        };
        self.audit.emit(
            EventKind::UserCreate,
            &actor,
            Status::from_ok(outcome.is_ok()),
            remote_addr,
            audit_params,
        );

        let user = outcome?;
        tracing::info!(user = %user.login_name, is_admin, "Provisioned identity from IAM token");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = IamConfig::from_settings(&Settings::empty()).unwrap();
        assert!(!config.enabled);
        assert!(config.ws_privileges_enabled);
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.tool_name, "sc");
        assert!(config.whitelists.user.is_empty());
    }

    #[test]
    fn config_from_ini() {
        let settings = Settings::parse(
            "[iam]\nENABLED = true\nCASBIN_CACHE_UPDATE_TTL_IN_SECONDS = 5\n\
             WHITE_LIST_ROLES_USER = dev, qa\nWHITE_LIST_ROLES_ADMIN = ops\n\
             WS_PRIVILEGES_ENABLED = false\n",
        )
        .unwrap();
        let config = IamConfig::from_settings(&settings).unwrap();
        assert!(config.enabled);
        assert!(!config.ws_privileges_enabled);
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
        assert_eq!(config.whitelists.user, vec!["dev".to_string(), "qa".to_string()]);
        assert_eq!(config.whitelists.admin, vec!["ops".to_string()]);
    }

    #[test]
    fn bad_ttl_is_rejected() {
        let settings = Settings::parse("[iam]\nCASBIN_CACHE_UPDATE_TTL_IN_SECONDS = soon\n").unwrap();
        assert!(IamConfig::from_settings(&settings).is_err());
    }
}
