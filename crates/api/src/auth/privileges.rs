//! `Ws-Privileges` header.
//!
//! The header is a JSON array (optionally base64 encoded) of
//! `{"organization": <org key>, "rolesMapping": {<role>: [<grant>, ...]}}`.
//! Each grant reads `tenant_tool_project_level`.

use std::collections::{BTreeMap, BTreeSet};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use sourcegate_core::roles::AccessMode;

use super::error::AuthError;

pub const HEADER: &str = "Ws-Privileges";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Privilege {
    pub tenant: String,
    pub tool: String,
    pub project: String,
    pub mode: AccessMode,
}

impl Privilege {
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let parts: Vec<&str> = raw.split('_').collect();
        let [tenant, tool, project, level] = parts.as_slice() else {
            return Err(AuthError::ParsePrivileges(format!(
                "grant `{raw}` does not have four parts"
            )));
        };
        let mode = AccessMode::from_level(level).ok_or_else(|| {
            AuthError::ParsePrivileges(format!("grant `{raw}` has unknown level `{level}`"))
        })?;
        Ok(Self {
            tenant: tenant.to_string(),
            tool: tool.to_string(),
            project: project.to_string(),
            mode,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    organization: String,
    #[serde(rename = "rolesMapping", default)]
    roles_mapping: BTreeMap<String, Vec<String>>,
}

/// Grants of this tool, keyed by organization key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegesByTenant(BTreeMap<String, BTreeSet<Privilege>>);

impl PrivilegesByTenant {
    /// Parse the header value, keeping only grants for `tool`.
    pub fn parse(raw: &str, tool: &str) -> Result<Self, AuthError> {
        let raw = raw.trim();
        let json = if raw.starts_with('[') {
            raw.as_bytes().to_vec()
        } else {
            STANDARD
                .decode(raw)
                .map_err(|e| AuthError::ParsePrivileges(format!("decode header: {e}")))?
        };
        let entries: Vec<RawEntry> = serde_json::from_slice(&json)
            .map_err(|e| AuthError::ParsePrivileges(format!("unmarshal privileges: {e}")))?;

        let mut by_tenant: BTreeMap<String, BTreeSet<Privilege>> = BTreeMap::new();
        for entry in entries {
            for grants in entry.roles_mapping.values() {
                for grant in grants {
                    let privilege = Privilege::parse(grant)?;
                    if privilege.tool != tool {
                        continue;
                    }
                    by_tenant
                        .entry(entry.organization.clone())
                        .or_default()
                        .insert(privilege);
                }
            }
        }
        Ok(Self(by_tenant))
    }

    fn for_tenant<'a>(&'a self, org_key: &'a str) -> impl Iterator<Item = &'a Privilege> + 'a {
        self.0
            .get(org_key)
            .into_iter()
            .flatten()
            .filter(move |p| p.tenant == org_key)
    }

    /// Distinct project names granted under `org_key`.
    pub fn project_names(&self, org_key: &str) -> Vec<String> {
        self.for_tenant(org_key)
            .map(|p| p.project.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Strongest mode per lower-cased project name under `org_key`.
    pub fn max_modes(&self, org_key: &str) -> BTreeMap<String, AccessMode> {
        let mut modes: BTreeMap<String, AccessMode> = BTreeMap::new();
        for privilege in self.for_tenant(org_key) {
            let slot = modes
                .entry(privilege.project.to_lowercase())
                .or_insert(privilege.mode);
            *slot = (*slot).max(privilege.mode);
        }
        modes
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(raw: &str) -> PrivilegesByTenant {
        PrivilegesByTenant::parse(raw, "sc").unwrap()
    }

    #[test]
    fn single_grant() {
        let p = parse(r#"[{"organization":"rum","rolesMapping":{"project_coordinator":["rum_sc_skey_x"]}}]"#);
        assert_eq!(p.project_names("rum"), vec!["skey".to_string()]);
        assert_eq!(p.max_modes("rum")["skey"], AccessMode::Manager);
    }

    #[test]
    fn other_tools_and_tenants_are_ignored() {
        let p = parse(
            r#"[{"organization":"rum","rolesMapping":{"a":["rum_wrongtool_skey_w"],"b":["sbt_sc_other_a"],"c":["rum_sc_skey_w"]}}]"#,
        );
        assert_eq!(p.project_names("rum"), vec!["skey".to_string()]);
        assert_eq!(p.max_modes("rum").len(), 1);
        assert!(p.project_names("sbt").is_empty());
    }

    #[test]
    fn strongest_mode_wins_and_duplicates_collapse() {
        let p = parse(
            r#"[{"organization":"t","rolesMapping":{"a":["t_sc_Api_r","t_sc_api_w","t_sc_api_w"],"b":["t_sc_api_x"]}}]"#,
        );
        assert_eq!(p.max_modes("t")["api"], AccessMode::Manager);
        assert_eq!(p.project_names("t"), vec!["Api".to_string(), "api".to_string()]);
    }

    #[test]
    fn empty_shapes() {
        assert!(parse("[]").is_empty());
        assert!(parse(r#"[{"organization":"rum"}]"#).is_empty());
        assert!(parse(r#"[{"organization":"rum","rolesMapping":{"x":[]}}]"#).is_empty());
    }

    #[test]
    fn base64_header_is_accepted() {
        let encoded = STANDARD.encode(r#"[{"organization":"t","rolesMapping":{"a":["t_sc_p_a"]}}]"#);
        assert_eq!(parse(&encoded).max_modes("t")["p"], AccessMode::Owner);
    }

    #[test]
    fn malformed_grants_fail() {
        for grant in ["tenant_sc_project_rw", "", "tenant_snake_case_sc_project_x"] {
            let raw = format!(r#"[{{"organization":"t","rolesMapping":{{"a":["{grant}"]}}}}]"#);
            assert_matches!(PrivilegesByTenant::parse(&raw, "sc"), Err(AuthError::ParsePrivileges(_)));
        }
        assert_matches!(PrivilegesByTenant::parse("{not json", "sc"), Err(AuthError::ParsePrivileges(_)));
    }
}
