//! Wire schemas of repository events.
//!
//! Every publishable event is emitted twice: once in the flat v1 layout and
//! once in the v2 layout with separate metadata, context and payload.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const V1_VERSION: &str = "1.0.0";
pub const V2_VERSION: &str = "2.0.0";

/// Domain input shared by both schema versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCreated {
    pub repository_id: i64,
    pub name: String,
    pub owner_name: String,
    pub description: String,
    /// Repository URL without credentials.
    pub link: String,
    pub created_unix: i64,
    pub tenant_id: String,
    pub tenant_name: String,
    pub doer_id: String,
}

impl RepositoryCreated {
    /// `/{tenant}/{owner}/{repo}`.
    pub fn project_id(&self) -> String {
        format!("/{}/{}/{}", self.tenant_name, self.owner_name, self.name)
    }

    pub fn to_v1(&self, issuer: &str) -> CreateRepositoryEventV1 {
        CreateRepositoryEventV1 {
            id: Uuid::new_v4().to_string(),
            action: "Create".into(),
            issuer: issuer.to_string(),
            project_info: ProjectInfo {
                project_id: self.project_id(),
            },
            properties: vec![
                Property::new("project-name", &self.name),
                Property::new("project-description", &self.description),
                Property::new("uri", &self.link),
            ],
            timestamp: self.created_unix,
            kind: "Node".into(),
            user_info: UserInfo {
                user_id: self.doer_id.clone(),
            },
            tenant_id: self.tenant_id.clone(),
            version: V1_VERSION.into(),
        }
    }

    pub fn to_v2(&self, issuer: &str) -> CreateRepositoryEventV2 {
        let mut additional_properties = BTreeMap::new();
        additional_properties.insert("repository_description".to_string(), self.description.clone());
        additional_properties.insert("repository_uri".to_string(), self.link.clone());

        CreateRepositoryEventV2 {
            context: Context {
                entity_type: "REPOSITORY".into(),
                event_code: "CREATE".into(),
                event_create_ts: self.created_unix.to_string(),
                event_id: Uuid::new_v4().to_string(),
                tenant_id: self.tenant_id.clone(),
            },
            metadata: Metadata {
                correlation_message_id: None,
                message_create_ts: Utc::now().timestamp().to_string(),
                message_id: Uuid::new_v4().to_string(),
                producer: Producer {
                    id: issuer.to_string(),
                },
                version: V2_VERSION.into(),
            },
            payload: Payload {
                repository_info: RepositoryInfo {
                    project_name: self.owner_name.clone(),
                    repository_id: self.repository_id.to_string(),
                    repository_name: self.name.clone(),
                    tenant_name: self.tenant_name.clone(),
                },
                initiator_user: InitiatorUser {
                    id: self.doer_id.clone(),
                },
                additional_properties,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// v1
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRepositoryEventV1 {
    pub id: String,
    pub action: String,
    pub issuer: String,
    pub project_info: ProjectInfo,
    pub properties: Vec<Property>,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub user_info: UserInfo,
    pub tenant_id: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// v2
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRepositoryEventV2 {
    pub context: Context,
    pub metadata: Metadata,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub entity_type: String,
    pub event_code: String,
    pub event_create_ts: String,
    pub event_id: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub correlation_message_id: Option<String>,
    pub message_create_ts: String,
    pub message_id: String,
    pub producer: Producer,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub repository_info: RepositoryInfo,
    pub initiator_user: InitiatorUser,
    pub additional_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub project_name: String,
    pub repository_id: String,
    pub repository_name: String,
    pub tenant_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatorUser {
    pub id: String,
}
