//! Role vocabulary shared by authentication and privilege projection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Global role derived from identity-provider groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => ROLE_USER,
            Role::Admin => ROLE_ADMIN,
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organization-level access mode, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Reader,
    Writer,
    Manager,
    Owner,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::Reader => "reader",
            AccessMode::Writer => "writer",
            AccessMode::Manager => "manager",
            AccessMode::Owner => "owner",
        }
    }

    /// Single-letter level code used in privilege grant strings.
    pub fn from_level(level: &str) -> Option<Self> {
        match level {
            "r" => Some(AccessMode::Reader),
            "w" => Some(AccessMode::Writer),
            "x" => Some(AccessMode::Manager),
            "a" => Some(AccessMode::Owner),
            _ => None,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reader" => Ok(AccessMode::Reader),
            "writer" => Ok(AccessMode::Writer),
            "manager" => Ok(AccessMode::Manager),
            "owner" => Ok(AccessMode::Owner),
            other => Err(format!("unknown access mode `{other}`")),
        }
    }
}
