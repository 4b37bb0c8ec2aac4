//! Audit record construction and flat JSON serialization.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use sourcegate_core::host::{HostInfo, SENTINEL};

use crate::event::EventKind;

/// Free-form parameters hoisted to the top level of the record.
pub type Params = BTreeMap<String, String>;

pub const FORMAT_VERSION: &str = "1";

/// Outcome recorded with an event.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unknown = 0,
    Success = 1,
    Failure = 2,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unknown => "UNKNOWN",
            Status::Success => "SUCCESS",
            Status::Failure => "FAIL",
        }
    }

    pub fn from_ok(ok: bool) -> Self {
        if ok {
            Status::Success
        } else {
            Status::Failure
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed the audited action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub name: String,
    pub id: String,
}

impl Actor {
    pub fn new(name: impl Into<String>, id: impl ToString) -> Self {
        Self {
            name: name.into(),
            id: id.to_string(),
        }
    }

    /// Scheduler-originated actions.
    pub fn cron() -> Self {
        Self::new("(Cron)", SENTINEL)
    }

    /// Actions with no identifiable user.
    pub fn anonymous() -> Self {
        Self::new(SENTINEL, SENTINEL)
    }
}

/// One immutable audit record.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: Uuid,
    pub kind: EventKind,
    pub event_date: String,
    pub username: String,
    pub internal_id: String,
    pub status: Status,
    pub user_ip: String,
    pub host_name: String,
    pub host_ip: String,
    pub params: Params,
}

impl AuditRecord {
    /// Build a record for `kind`. Returns `None` for [`EventKind::Undefined`].
    pub fn new(
        kind: EventKind,
        actor: &Actor,
        status: Status,
        remote_addr: &str,
        params: Params,
    ) -> Option<Self> {
        if !kind.is_defined() {
            tracing::error!(user = %actor.name, "Undefined audit event dropped");
            return None;
        }

        let id = Uuid::now_v7();
        let host = HostInfo::current();

        Some(Self {
            id,
            kind,
            event_date: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            username: required(&actor.name, "username", id),
            internal_id: required(&actor.id, "internal_id", id),
            status,
            user_ip: user_ip(remote_addr),
            host_name: host.name.clone(),
            host_ip: host.ip.clone(),
            params,
        })
    }

    /// Flat JSON object: structured fields plus every non-empty parameter.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut fields = Map::new();
        let mut put = |key: &str, value: &str| {
            fields.insert(key.to_string(), Value::String(value.to_string()));
        };
        put("id", &self.id.to_string());
        put("event", self.kind.description());
        put("eventdate", &self.event_date);
        put("username", &self.username);
        put("internal_id", &self.internal_id);
        put("status", self.status.as_str());
        put("user_ip", &self.user_ip);
        put("host.name", &self.host_name);
        put("host.ip", &self.host_ip);
        put("format_version", FORMAT_VERSION);

        for (key, value) in &self.params {
            if !value.is_empty() {
                fields.insert(key.clone(), Value::String(value.clone()));
            }
        }

        serde_json::to_string(&Value::Object(fields))
    }
}

fn required(value: &str, field: &str, id: Uuid) -> String {
    if value.trim().is_empty() {
        tracing::warn!(%id, field, "Empty required audit field, using sentinel");
        SENTINEL.to_string()
    } else {
        value.to_string()
    }
}

/// Client address from `host:port`, `[v6]:port` or a bare IP literal.
pub fn user_ip(remote_addr: &str) -> String {
    let remote_addr = remote_addr.trim();
    if remote_addr.is_empty() || remote_addr == SENTINEL {
        return SENTINEL.to_string();
    }
    if let Ok(addr) = remote_addr.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    if remote_addr.parse::<IpAddr>().is_ok() {
        return remote_addr.to_string();
    }
    if let Some((host, port)) = remote_addr.rsplit_once(':') {
        if !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok() {
            return host.to_string();
        }
    }
    tracing::warn!(remote_addr, "Could not extract user ip, using sentinel");
    SENTINEL.to_string()
}

/// Convenience for building [`Params`] from string pairs.
pub fn params<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
