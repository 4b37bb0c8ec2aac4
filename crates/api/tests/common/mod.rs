#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use sourcegate_api::auth::basic::BasicChain;
use sourcegate_api::auth::iam::{IamConfig, IamProxy};
use sourcegate_api::auth::jwt::JwtConfig;
use sourcegate_api::auth::roles::RoleWhitelists;
use sourcegate_api::auth::store::MemoryDirectory;
use sourcegate_api::auth::Authenticator;
pub use sourcegate_api::config::ServerConfig;
use sourcegate_api::router::build_app_router;
use sourcegate_api::state::AppState;
use sourcegate_audit::AuditSink;
use sourcegate_cron::{CronConfig, CronService, LockRegistry, MemoryCronLockStore, Task, TaskConfig};
use sourcegate_events::EventEmitter;

pub const JWT_SECRET: &str = "test-signing-secret";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        app_work_path: std::env::temp_dir(),
        trust_forwarded_for: false,
    }
}

pub fn iam_config() -> IamConfig {
    IamConfig {
        enabled: true,
        whitelists: RoleWhitelists {
            user: vec!["sc-users".to_string()],
            admin: vec!["sc-admins".to_string()],
        },
        ..IamConfig::default()
    }
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: JWT_SECRET.to_string(),
        access_token_expiry_mins: 15,
    }
}

/// Everything a test may want to inspect after driving the router.
pub struct TestApp {
    pub router: Router,
    pub directory: MemoryDirectory,
    pub audit: Arc<Mutex<Vec<String>>>,
}

impl TestApp {
    /// Audit records of the given event description.
    pub fn audit_events(&self, description: &str) -> Vec<Value> {
        self.audit
            .lock()
            .unwrap()
            .iter()
            .map(|line| serde_json::from_str::<Value>(line).unwrap())
            .filter(|event| event["event"] == description)
            .collect()
    }
}

/// Full router over in-memory stores. `iam` of `None` runs the basic chain only.
pub async fn build_test_app(iam: Option<IamConfig>) -> TestApp {
    build_test_app_with(test_config(), iam).await
}

pub async fn build_test_app_with(config: ServerConfig, iam: Option<IamConfig>) -> TestApp {
    let directory = MemoryDirectory::new();
    let (audit, journal) = AuditSink::memory();

    let store = Arc::new(directory.clone());
    let iam = iam.map(|config| IamProxy::new(config, store.clone(), store.clone(), audit.clone()));
    let auth = Authenticator::new(iam, BasicChain::new(jwt_config(), store));

    let registry = LockRegistry::with_host(Arc::new(MemoryCronLockStore::new()), "node-a", "10.0.0.1");
    let mut cron = CronService::new(CronConfig::default(), registry, audit.clone());
    cron.register(
        Task::new("repo_gc", TaskConfig::new("0 3 * * *"), |_cancel| async { Ok(()) }).unwrap(),
    )
    .await
    .unwrap();

    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        auth: Arc::new(auth),
        cron: Arc::new(cron),
        events: Arc::new(EventEmitter::disabled(audit.clone())),
        audit,
    };

    TestApp {
        router: build_app_router(state, &config),
        directory,
        audit: journal,
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Unsigned RS256 identity-provider token.
pub fn iam_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({ "alg": "RS256", "typ": "JWT" }).to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn claims(sub: &str, groups: Option<&[&str]>) -> Value {
    let mut claims = json!({
        "sub": sub,
        "email": format!("{sub}@example.com"),
        "preferred_username": sub,
        "family_name": "Doe",
        "given_name": "Jane",
        "organization": "acme",
    });
    if let Some(groups) = groups {
        claims["groups"] = json!(groups);
    }
    claims
}

pub fn privileges(grants: &[&str]) -> String {
    json!([{ "organization": "acme", "rolesMapping": { "developer": grants } }]).to_string()
}

pub fn basic(login: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{login}:{password}")))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Send a request with the given headers and return status and JSON body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub async fn get(app: &Router, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    send(app, "GET", uri, headers).await
}

pub async fn post(app: &Router, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    send(app, "POST", uri, headers).await
}
