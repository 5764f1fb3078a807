//! HTTP-level integration tests for the auth and admin endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, delete_auth, get, get_auth, post_json, post_json_auth};
use orbit_api::auth::password::hash_password;
use orbit_core::roles::Role;
use orbit_db::models::user::{CreateUser, User};
use orbit_db::repositories::UserRepo;
use serde_json::json;
use sqlx::PgPool;

const PASSWORD: &str = "correct-horse-battery";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a user directly in the database.
async fn create_test_user(pool: &PgPool, user_name: &str, role: Role) -> User {
    let input = CreateUser {
        user_name: user_name.to_string(),
        email: format!("{user_name}@test.com"),
        password_hash: hash_password(PASSWORD).expect("hashing should succeed"),
        phone: None,
        role,
    };
    UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed")
}

/// Log in through the API and return the JSON body.
async fn login(pool: &PgPool, email: &str) -> serde_json::Value {
    let app = common::build_test_app(pool.clone());
    let body = json!({ "email": email, "password": PASSWORD });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn refresh(pool: &PgPool, refresh_token: &str) -> axum::http::Response<axum::body::Body> {
    let app = common::build_test_app(pool.clone());
    post_json(
        app,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": refresh_token }),
    )
    .await
}

fn str_field<'a>(json: &'a serde_json::Value, key: &str) -> &'a str {
    json[key].as_str().expect("field should be a string")
}

// ---------------------------------------------------------------------------
// Registration and login
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_returns_created_with_token_pair(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let body = json!({
        "user_name": "newbie",
        "email": "Newbie@Test.com",
        "password": PASSWORD,
    });
    let response = post_json(app, "/api/v1/auth/register", body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 900);
    assert_eq!(json["user"]["user_name"], "newbie");
    assert_eq!(json["user"]["email"], "newbie@test.com");
    assert_eq!(json["user"]["role"], "user");

    // The new account can log in with the same (case-insensitive) email.
    login(&pool, "NEWBIE@test.com").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_rejects_taken_email_and_user_name(pool: PgPool) {
    create_test_user(&pool, "taken", Role::User).await;

    let app = common::build_test_app(pool.clone());
    let body = json!({ "user_name": "other", "email": "taken@test.com", "password": PASSWORD });
    let response = post_json(app, "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let app = common::build_test_app(pool);
    let body = json!({ "user_name": "taken", "email": "fresh@test.com", "password": PASSWORD });
    let response = post_json(app, "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_rejects_short_password(pool: PgPool) {
    let app = common::build_test_app(pool);
    let body = json!({ "user_name": "shorty", "email": "shorty@test.com", "password": "abc" });
    let response = post_json(app, "/api/v1/auth/register", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn login_success_returns_pair_and_user(pool: PgPool) {
    let user = create_test_user(&pool, "loginuser", Role::Admin).await;

    let json = login(&pool, "loginuser@test.com").await;

    assert!(json["access_token"].is_string());
    let refresh_token = str_field(&json, "refresh_token");
    let (rotation_id, secret) = refresh_token.split_once('.').expect("separator present");
    assert_eq!(rotation_id.len(), 36);
    assert_eq!(secret.len(), 128);
    assert_eq!(json["user"]["id"], user.id);
    assert_eq!(json["user"]["role"], "admin");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn wrong_password_and_unknown_email_are_indistinguishable(pool: PgPool) {
    create_test_user(&pool, "victim", Role::User).await;

    let app = common::build_test_app(pool.clone());
    let body = json!({ "email": "victim@test.com", "password": "not-the-password" });
    let wrong_pw = post_json(app, "/api/v1/auth/login", body).await;

    let app = common::build_test_app(pool);
    let body = json!({ "email": "ghost@test.com", "password": PASSWORD });
    let unknown = post_json(app, "/api/v1/auth/login", body).await;

    assert_eq!(wrong_pw.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(wrong_pw).await, body_json(unknown).await);
}

// ---------------------------------------------------------------------------
// Refresh rotation
// ---------------------------------------------------------------------------

/// Login, refresh once, reuse fails, logout kills the lineage.
#[sqlx::test(migrations = "../../db/migrations")]
async fn refresh_rotates_and_rejects_second_use(pool: PgPool) {
    let user = create_test_user(&pool, "rotator", Role::User).await;
    let login_json = login(&pool, "rotator@test.com").await;
    let original = str_field(&login_json, "refresh_token").to_string();

    let response = refresh(&pool, &original).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated_json = body_json(response).await;
    let rotated = str_field(&rotated_json, "refresh_token").to_string();
    assert_ne!(rotated, original, "refresh token must rotate on use");
    assert_eq!(rotated_json["user_id"], user.id);
    assert_eq!(rotated_json["role"], "user");
    assert_eq!(rotated_json["token_type"], "Bearer");

    // Replaying the pre-rotation credential is rejected and trips reuse containment.
    let replay = refresh(&pool, &original).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(replay).await["code"], "UNAUTHORIZED");

    // Containment revoked the whole lineage, including the rotated credential.
    let after = refresh(&pool, &rotated).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);

    let app = common::build_test_app(pool);
    let access = str_field(&rotated_json, "access_token");
    let me = get_auth(app, "/api/v1/auth/me", access).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_refresh_token_is_bad_request(pool: PgPool) {
    let response = refresh(&pool, "not-a-real-token").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "MALFORMED_CREDENTIAL");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_refresh_token_is_unauthorized(pool: PgPool) {
    let token = format!("{}.{}", uuid::Uuid::new_v4(), "ab".repeat(64));
    let response = refresh(&pool, &token).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn logout_revokes_session_and_is_idempotent(pool: PgPool) {
    create_test_user(&pool, "leaver", Role::User).await;
    let login_json = login(&pool, "leaver@test.com").await;
    let refresh_token = str_field(&login_json, "refresh_token").to_string();
    let access_token = str_field(&login_json, "access_token").to_string();

    for _ in 0..2 {
        let app = common::build_test_app(pool.clone());
        let body = json!({ "refresh_token": refresh_token });
        let response = post_json(app, "/api/v1/auth/logout", body).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = refresh(&pool, &refresh_token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The access token is still unexpired but its session is gone.
    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/auth/me", &access_token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn logout_all_revokes_every_session(pool: PgPool) {
    create_test_user(&pool, "multi", Role::User).await;
    let first = login(&pool, "multi@test.com").await;
    let second = login(&pool, "multi@test.com").await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        "/api/v1/auth/logout-all",
        json!({}),
        str_field(&first, "access_token"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = refresh(&pool, str_field(&second, "refresh_token")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Authenticated reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn me_and_sessions_reflect_current_session(pool: PgPool) {
    let user = create_test_user(&pool, "reader", Role::User).await;
    let other = login(&pool, "reader@test.com").await;
    let current = login(&pool, "reader@test.com").await;
    let token = str_field(&current, "access_token");

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, "/api/v1/auth/me", token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["data"]["user"]["id"], user.id);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, "/api/v1/auth/sessions", token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let sessions = body_json(response).await;
    let list = sessions["data"].as_array().expect("data is an array");
    assert_eq!(list.len(), 2);
    let current_count = list.iter().filter(|s| s["is_current"] == true).count();
    assert_eq!(current_count, 1);
    let current_entry = list.iter().find(|s| s["is_current"] == true).unwrap();
    assert_eq!(current_entry["id"], me["data"]["session_id"]);

    // Revoking the other session leaves one.
    let app = common::build_test_app(pool.clone());
    let body = json!({ "refresh_token": str_field(&other, "refresh_token") });
    post_json(app, "/api/v1/auth/logout", body).await;

    let app = common::build_test_app(pool);
    let sessions = body_json(get_auth(app, "/api/v1/auth/sessions", token).await).await;
    assert_eq!(sessions["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn protected_routes_require_bearer_token(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    assert_eq!(
        get(app, "/api/v1/auth/me").await.status(),
        StatusCode::UNAUTHORIZED
    );

    let app = common::build_test_app(pool);
    assert_eq!(
        get_auth(app, "/api/v1/auth/me", "garbage").await.status(),
        StatusCode::UNAUTHORIZED
    );
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_revokes_user_sessions(pool: PgPool) {
    create_test_user(&pool, "boss", Role::Admin).await;
    let target = create_test_user(&pool, "target", Role::User).await;
    let admin_json = login(&pool, "boss@test.com").await;
    let target_json = login(&pool, "target@test.com").await;

    let app = common::build_test_app(pool.clone());
    let uri = format!("/api/v1/admin/users/{}/sessions", target.id);
    let response = delete_auth(app, &uri, str_field(&admin_json, "access_token")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["user_id"], target.id);
    assert_eq!(json["data"]["revoked"], 1);

    let response = refresh(&pool, str_field(&target_json, "refresh_token")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_endpoint_forbids_regular_users(pool: PgPool) {
    let user = create_test_user(&pool, "pleb", Role::User).await;
    let json = login(&pool, "pleb@test.com").await;

    let app = common::build_test_app(pool);
    let uri = format!("/api/v1/admin/users/{}/sessions", user.id);
    let response = delete_auth(app, &uri, str_field(&json, "access_token")).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_revoke_unknown_user_is_not_found(pool: PgPool) {
    create_test_user(&pool, "boss", Role::Admin).await;
    let json = login(&pool, "boss@test.com").await;

    let app = common::build_test_app(pool);
    let response = delete_auth(
        app,
        "/api/v1/admin/users/999999/sessions",
        str_field(&json, "access_token"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
