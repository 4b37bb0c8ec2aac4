//! Identity-provider proxy mode through the full router.

mod common;

use axum::http::StatusCode;
use common::{build_test_app, claims, iam_config, iam_token, privileges, TestApp};
use sourcegate_api::auth::store::IdentityStore;
use sourcegate_core::roles::AccessMode;
use sourcegate_db::models::organization::Organization;
use sourcegate_db::models::user::{CreateUser, LoginType};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn app_with_tenant() -> (TestApp, Organization) {
    let app = build_test_app(Some(iam_config())).await;
    let tenant = app.directory.add_tenant("acme", "acme");
    let organization = app.directory.add_organization(tenant.id, "api", true);
    (app, organization)
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

// ---------------------------------------------------------------------------
// Provisioning and roles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_request_provisions_user_and_grants_access() {
    let (app, organization) = app_with_tenant().await;
    let token = iam_token(&claims("u-100", Some(&["sc-users"][..])));
    let grants = privileges(&["acme_sc_api_w"]);

    let (status, body) = common::get(
        &app.router,
        "/api/v1/user",
        &[("Authorization", bearer(&token).as_str()), ("Ws-Privileges", grants.as_str())],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["login_name"], "u-100");
    assert_eq!(body["data"]["role"], "user");
    assert_eq!(body["data"]["method"], "iam");

    let user = app.directory.user("u-100").unwrap();
    assert_eq!(user.full_name, "Doe Jane");
    assert_eq!(user.login_type, "iam");
    assert_eq!(
        app.directory.grant_of(organization.id, user.id),
        Some(AccessMode::Writer)
    );
    assert_eq!(app.audit_events("Create user").len(), 1);
    assert_eq!(app.audit_events("Grant privileges to user").len(), 1);
}

#[tokio::test]
async fn admin_group_promotes_existing_user() {
    let (app, _) = app_with_tenant().await;
    app.directory
        .create(&CreateUser {
            login_name: "u-200".into(),
            name: "u-200".into(),
            full_name: "Doe Jane".into(),
            email: "u-200@example.com".into(),
            login_type: LoginType::Iam,
            is_admin: false,
            password_hash: None,
        })
        .await
        .unwrap();

    let token = iam_token(&claims("u-200", Some(&["sc-admins"][..])));
    let grants = privileges(&["acme_sc_api_r"]);
    let (status, body) = common::get(
        &app.router,
        "/api/v1/user",
        &[("Authorization", bearer(&token).as_str()), ("Ws-Privileges", grants.as_str())],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");
    assert!(app.directory.user("u-200").unwrap().is_admin);
    assert!(app.audit_events("Create user").is_empty());
}

#[tokio::test]
async fn missing_groups_with_privileges_enabled_is_forbidden() {
    let (app, _) = app_with_tenant().await;
    let token = iam_token(&claims("u-300", None));

    let (status, body) = common::get(
        &app.router,
        "/api/v1/user",
        &[("Authorization", bearer(&token).as_str()), ("Ws-Privileges", privileges(&[]).as_str())],
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ROLE_REQUIRED");
    assert!(body["error"].as_str().unwrap().contains("role required"));
    assert!(app.directory.user("u-300").is_none());

    let events = app.audit_events("Unauthorized request");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["status"], "FAIL");
    assert_eq!(events[0]["request_url"], "/api/v1/user");
}

#[tokio::test]
async fn groups_outside_whitelists_are_forbidden() {
    let (app, _) = app_with_tenant().await;
    let token = iam_token(&claims("u-301", Some(&["marketing"][..])));

    let (status, body) = common::get(
        &app.router,
        "/api/v1/user",
        &[("Authorization", bearer(&token).as_str()), ("Ws-Privileges", privileges(&[]).as_str())],
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ROLE_MISMATCH");
}

#[tokio::test]
async fn non_rs256_token_is_forbidden() {
    let (app, _) = app_with_tenant().await;
    let token = sourcegate_api::auth::jwt::generate_access_token(
        1,
        sourcegate_core::roles::Role::User,
        &common::jwt_config(),
    )
    .unwrap();

    let (status, body) =
        common::get(&app.router, "/api/v1/user", &[("Authorization", bearer(&token).as_str())]).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PARSE_IAM_JWT");
}

// ---------------------------------------------------------------------------
// Privilege projection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_privileges_header_is_forbidden() {
    let (app, _) = app_with_tenant().await;
    let token = iam_token(&claims("u-400", Some(&["sc-users"][..])));

    let (status, body) =
        common::get(&app.router, "/api/v1/user", &[("Authorization", bearer(&token).as_str())]).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PARSE_PRIVILEGES");
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let app = build_test_app(Some(iam_config())).await;
    let token = iam_token(&claims("u-401", Some(&["sc-users"][..])));

    let (status, body) = common::get(
        &app.router,
        "/api/v1/user",
        &[("Authorization", bearer(&token).as_str()), ("Ws-Privileges", privileges(&["acme_sc_api_r"]).as_str())],
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TENANT_NOT_FOUND");
    assert_eq!(app.directory.last_login_writes(), 0);
}

#[tokio::test]
async fn projection_is_cached_until_ttl_expires() {
    let (app, organization) = app_with_tenant().await;
    let token = iam_token(&claims("u-500", Some(&["sc-users"][..])));
    let auth = bearer(&token);

    let first = privileges(&["acme_sc_api_r"]);
    let (status, _) = common::get(
        &app.router,
        "/api/v1/user",
        &[("Authorization", auth.as_str()), ("Ws-Privileges", first.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.directory.last_login_writes(), 1);

    // Within the window a stronger grant is not projected yet.
    let second = privileges(&["acme_sc_api_a"]);
    let headers = [("Authorization", auth.as_str()), ("Ws-Privileges", second.as_str())];
    let (status, _) = common::get(&app.router, "/api/v1/user", &headers).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.directory.last_login_writes(), 1);
    let user = app.directory.user("u-500").unwrap();
    assert_eq!(app.directory.grant_of(organization.id, user.id), Some(AccessMode::Reader));

    app.directory.age_last_login("u-500", 60);
    let (status, _) = common::get(&app.router, "/api/v1/user", &headers).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.directory.last_login_writes(), 2);
    assert_eq!(app.directory.grant_of(organization.id, user.id), Some(AccessMode::Owner));
}

#[tokio::test]
async fn git_protocol_requests_skip_the_privilege_cache() {
    let (app, _) = app_with_tenant().await;
    let mut token_claims = claims("u-600", Some(&["sc-users"][..]));
    token_claims["organization"] = "".into();
    let token = iam_token(&token_claims);

    let (status, body) = common::get(
        &app.router,
        "/api/v1/user",
        &[("Authorization", bearer(&token).as_str()), ("Git-Protocol", "version=2")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "user");
    assert_eq!(app.directory.last_login_writes(), 0);
    assert_eq!(app.directory.grant_count(), 0);
}

#[tokio::test]
async fn git_protocol_requests_still_require_a_role() {
    let (app, _) = app_with_tenant().await;
    let token = iam_token(&claims("u-601", None));

    let (status, body) = common::get(
        &app.router,
        "/api/v1/user",
        &[("Authorization", bearer(&token).as_str()), ("Git-Protocol", "version=2")],
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ROLE_REQUIRED");
    assert!(app.directory.user("u-601").is_none());
    assert_eq!(app.directory.user_count(), 0);
}

// ---------------------------------------------------------------------------
// Fallback to the basic chain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn anonymous_requests_pass_through_to_extractors() {
    let (app, _) = app_with_tenant().await;

    let (status, body) = common::get(&app.router, "/api/v1/user", &[]).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert!(app.audit_events("Unauthorized request").is_empty());
}

#[tokio::test]
async fn basic_credentials_still_work_in_iam_mode() {
    let (app, _) = app_with_tenant().await;
    app.directory
        .create(&CreateUser {
            login_name: "ci-bot".into(),
            name: "ci-bot".into(),
            full_name: "CI".into(),
            email: "ci@example.com".into(),
            login_type: LoginType::Local,
            is_admin: false,
            password_hash: Some(sourcegate_api::auth::password::hash_password("s3cret").unwrap()),
        })
        .await
        .unwrap();

    let (status, body) = common::get(
        &app.router,
        "/api/v1/user",
        &[("Authorization", common::basic("ci-bot", "s3cret").as_str())],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["method"], "basic");
}
