//! Global role from identity-provider groups.

use sourcegate_core::roles::Role;

use super::error::AuthError;

/// Group names that map onto local roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleWhitelists {
    pub user: Vec<String>,
    pub admin: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRole {
    pub role: Role,
    /// Whether the groups decided the role; only then is `is_admin` reconciled.
    pub groups_present: bool,
}

impl ResolvedRole {
    fn fallback() -> Self {
        Self {
            role: Role::User,
            groups_present: false,
        }
    }
}

pub fn resolve_role(
    groups: Option<&[String]>,
    whitelists: &RoleWhitelists,
    ws_privileges_enabled: bool,
) -> Result<ResolvedRole, AuthError> {
    let Some(groups) = groups.filter(|g| !g.is_empty()) else {
        if ws_privileges_enabled {
            return Err(AuthError::RoleRequired);
        }
        return Ok(ResolvedRole::fallback());
    };

    let is_user = groups.iter().any(|g| whitelists.user.contains(g));
    let is_admin = groups.iter().any(|g| whitelists.admin.contains(g));

    if !is_user && !is_admin {
        if !whitelists.user.is_empty() || !whitelists.admin.is_empty() {
            return Err(AuthError::RoleMismatch);
        }
        return Ok(ResolvedRole::fallback());
    }

    Ok(ResolvedRole {
        role: if is_admin { Role::Admin } else { Role::User },
        groups_present: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn whitelists(user: &[&str], admin: &[&str]) -> RoleWhitelists {
        RoleWhitelists {
            user: user.iter().map(|s| s.to_string()).collect(),
            admin: admin.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn absent_groups() {
        let lists = whitelists(&["ROLE_USER"], &["ROLE_ADMIN"]);
        assert_matches!(resolve_role(None, &lists, true), Err(AuthError::RoleRequired));
        assert_matches!(resolve_role(Some([].as_slice()), &lists, true), Err(AuthError::RoleRequired));
        assert_eq!(resolve_role(None, &lists, false).unwrap(), ResolvedRole::fallback());
    }

    #[test]
    fn unmatched_groups() {
        let g = groups(&["ROLE_GUEST"]);
        assert_matches!(
            resolve_role(Some(&g), &whitelists(&["ROLE_USER"], &[]), true),
            Err(AuthError::RoleMismatch)
        );
        assert_matches!(
            resolve_role(Some(&g), &whitelists(&[], &["ROLE_ADMIN"]), false),
            Err(AuthError::RoleMismatch)
        );
        assert_eq!(
            resolve_role(Some(&g), &whitelists(&[], &[]), true).unwrap(),
            ResolvedRole::fallback()
        );
    }

    #[test]
    fn admin_takes_precedence() {
        let lists = whitelists(&["ROLE_USER"], &["ROLE_ADMIN"]);
        let both = groups(&["ROLE_USER", "ROLE_ADMIN"]);
        let resolved = resolve_role(Some(&both), &lists, true).unwrap();
        assert_eq!(resolved.role, Role::Admin);
        assert!(resolved.groups_present);

        let user = groups(&["ROLE_USER", "OTHER"]);
        let resolved = resolve_role(Some(&user), &lists, true).unwrap();
        assert_eq!(resolved.role, Role::User);
        assert!(resolved.groups_present);
    }
}
