//! Basic-mode authentication chain and role checks.

mod common;

use axum::http::StatusCode;
use common::{basic, build_test_app, jwt_config, TestApp};
use sourcegate_api::auth::jwt::generate_access_token;
use sourcegate_api::auth::password::hash_password;
use sourcegate_api::auth::store::IdentityStore;
use sourcegate_core::roles::Role;
use sourcegate_db::models::user::{CreateUser, LoginType, User};

async fn local_user(app: &TestApp, login: &str, is_admin: bool) -> User {
    app.directory
        .create(&CreateUser {
            login_name: login.into(),
            name: login.into(),
            full_name: login.into(),
            email: format!("{login}@example.com"),
            login_type: LoginType::Local,
            is_admin,
            password_hash: Some(hash_password("correct horse").unwrap()),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn basic_credentials_authenticate() {
    let app = build_test_app(None).await;
    local_user(&app, "carol", false).await;

    let auth = basic("carol", "correct horse");
    let (status, body) = common::get(&app.router, "/api/v1/user", &[("Authorization", auth.as_str())]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["login_name"], "carol");
    assert_eq!(body["data"]["method"], "basic");
    assert_eq!(body["data"]["role"], "user");
}

#[tokio::test]
async fn wrong_password_is_unauthorized_and_audited() {
    let app = build_test_app(None).await;
    local_user(&app, "carol", false).await;

    let auth = basic("carol", "battery staple");
    let (status, body) = common::get(&app.router, "/api/v1/user", &[("Authorization", auth.as_str())]).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    let events = app.audit_events("Unauthorized request");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["request_url"], "/api/v1/user");
}

#[tokio::test]
async fn local_access_token_authenticates() {
    let app = build_test_app(None).await;
    let user = local_user(&app, "dave", true).await;
    let token = generate_access_token(user.id, Role::Admin, &jwt_config()).unwrap();

    let auth = format!("Bearer {token}");
    let (status, body) = common::get(&app.router, "/api/v1/user", &[("Authorization", auth.as_str())]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["method"], "token");
    assert_eq!(body["data"]["role"], "admin");
}

#[tokio::test]
async fn iam_tokens_are_rejected_without_iam() {
    let app = build_test_app(None).await;
    let token = common::iam_token(&common::claims("u-1", None));

    let auth = format!("Bearer {token}");
    let (status, _) = common::get(&app.router, "/api/v1/user", &[("Authorization", auth.as_str())]).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn basic_login_exchanges_for_a_bearer_token() {
    let app = build_test_app(None).await;
    local_user(&app, "erin", false).await;

    let auth = basic("erin", "correct horse");
    let (status, body) = common::post(&app.router, "/api/v1/user/token", &[("Authorization", auth.as_str())]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["expires_in"], 15 * 60);

    let bearer = format!("Bearer {}", body["data"]["access_token"].as_str().unwrap());
    let (status, body) = common::get(&app.router, "/api/v1/user", &[("Authorization", bearer.as_str())]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["login_name"], "erin");
    assert_eq!(body["data"]["method"], "token");

    // A token cannot mint further tokens.
    let (status, body) = common::post(&app.router, "/api/v1/user/token", &[("Authorization", bearer.as_str())]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn token_exchange_requires_authentication() {
    let app = build_test_app(None).await;

    let (status, _) = common::post(&app.router, "/api/v1/user/token", &[]).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
