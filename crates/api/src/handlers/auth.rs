//! Handlers for the `/auth` resource.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use orbit_core::error::CoreError;
use orbit_core::roles::Role;
use orbit_core::types::{DbId, Timestamp};
use orbit_db::models::user::{CreateUser, User};
use orbit_db::repositories::UserRepo;
use serde::{Deserialize, Serialize};

use crate::auth::password::{validate_password_strength, verify_unknown_account};
use crate::auth::session::{ClientInfo, IssuedTokens, SessionUser};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Returned for both an unknown email and a wrong password.
const INVALID_LOGIN: &str = "Invalid email or password";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/refresh` and `POST /auth/logout`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Successful authentication response returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserInfo,
}

/// Response body for `POST /auth/refresh`.
///
/// Built only from what the rotation returned; the committed rotation must
/// reach the client even if a follow-up read would fail.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user_id: DbId,
    pub role: &'static str,
}

/// Public user info embedded in responses.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: DbId,
    pub user_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: &'static str,
}

/// Response body for `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserInfo,
    pub session_id: DbId,
}

/// One active session as listed by `GET /auth/sessions`.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: DbId,
    pub created_at: Timestamp,
    pub last_rotated_at: Timestamp,
    pub expires_at: Timestamp,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Whether this is the session the request was authenticated with.
    pub is_current: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create a user account and sign it in. Returns 201 with a token pair.
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user_name = input.user_name.trim().to_string();
    let email = normalize_email(&input.email);
    if user_name.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "User name must not be empty".into(),
        )));
    }
    if !email.contains('@') {
        return Err(AppError::Core(CoreError::Validation(
            "Email address is invalid".into(),
        )));
    }
    validate_password_strength(&input.password, state.config.password_min_length)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    // The unique constraints still guard against a concurrent registration.
    if UserRepo::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict(
            "Email is already registered".into(),
        )));
    }
    if UserRepo::find_by_user_name(&state.pool, &user_name)
        .await?
        .is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(
            "User name is already taken".into(),
        )));
    }

    let password_hash = state
        .passwords
        .hash(&input.password)
        .await
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            user_name,
            email,
            password_hash,
            phone: input.phone.filter(|p| !p.trim().is_empty()),
            role: Role::DEFAULT,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "User registered");

    let role = user_role(&user)?;
    let tokens = state
        .sessions
        .create_session(SessionUser { user_id: user.id, role }, client)
        .await?;

    Ok((StatusCode::CREATED, Json(auth_response(tokens, &user, role))))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Returns access and refresh tokens.
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let Some(user) = UserRepo::find_by_email(&state.pool, &normalize_email(&input.email)).await?
    else {
        verify_unknown_account(state.passwords.as_ref(), &input.password)
            .await
            .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
        tracing::debug!("Login rejected: unknown email");
        return Err(AppError::Core(CoreError::Unauthorized(INVALID_LOGIN.into())));
    };

    let password_valid = state
        .passwords
        .verify(&input.password, &user.password_hash)
        .await
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::debug!(user_id = user.id, "Login rejected: wrong password");
        return Err(AppError::Core(CoreError::Unauthorized(INVALID_LOGIN.into())));
    }

    let role = user_role(&user)?;
    let tokens = state
        .sessions
        .create_session(SessionUser { user_id: user.id, role }, client)
        .await?;

    Ok(Json(auth_response(tokens, &user, role)))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token for a new pair. The presented token stops working.
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let tokens = state.sessions.refresh(&input.refresh_token, client).await?;
    Ok(Json(refresh_response(tokens)))
}

/// POST /api/v1/auth/logout
///
/// Revoke the session a refresh token belongs to. Returns 204 No Content,
/// also when the session is unknown or already revoked.
pub async fn logout(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<StatusCode> {
    state.sessions.logout(&input.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/auth/logout-all
///
/// Revoke every session of the authenticated user. Returns 204 No Content.
pub async fn logout_all(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<StatusCode> {
    let revoked = state.sessions.revoke_all(auth_user.user_id).await?;
    tracing::info!(user_id = auth_user.user_id, revoked, "Logged out everywhere");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<MeResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: auth_user.user_id,
        }))?;
    let role = user_role(&user)?;

    Ok(Json(DataResponse {
        data: MeResponse {
            user: user_info(&user, role),
            session_id: auth_user.session_id,
        },
    }))
}

/// GET /api/v1/auth/sessions
///
/// List the authenticated user's active sessions, newest first.
pub async fn sessions(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<SessionInfo>>>> {
    let sessions = state.sessions.list_sessions(auth_user.user_id).await?;

    let data = sessions
        .into_iter()
        .map(|s| SessionInfo {
            is_current: s.id == auth_user.session_id,
            id: s.id,
            created_at: s.created_at,
            last_rotated_at: s.issued_at,
            expires_at: s.expires_at,
            client_ip: s.client_ip,
            user_agent: s.user_agent,
        })
        .collect();

    Ok(Json(DataResponse { data }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn user_role(user: &User) -> AppResult<Role> {
    user.role()
        .map_err(|e| AppError::InternalError(format!("User {} has {e}", user.id)))
}

fn user_info(user: &User, role: Role) -> UserInfo {
    UserInfo {
        id: user.id,
        user_name: user.user_name.clone(),
        email: user.email.clone(),
        phone: user.phone.clone(),
        role: role.name(),
    }
}

fn auth_response(tokens: IssuedTokens, user: &User, role: Role) -> AuthResponse {
    AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "Bearer",
        expires_in: tokens.expires_in,
        user: user_info(user, role),
    }
}

fn refresh_response(tokens: IssuedTokens) -> RefreshResponse {
    RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "Bearer",
        expires_in: tokens.expires_in,
        user_id: tokens.user_id,
        role: tokens.role.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_compared_lowercased() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn refresh_response_needs_only_the_issued_tokens() {
        let tokens = IssuedTokens {
            access_token: "access".into(),
            expires_in: 900,
            refresh_token: "rotation.secret".into(),
            user_id: 42,
            role: Role::Admin,
            session_id: 7,
            rotation_id: uuid::Uuid::nil(),
            refresh_expires_at: chrono::Utc::now(),
        };

        let body = serde_json::to_value(refresh_response(tokens)).unwrap();
        assert_eq!(body["access_token"], "access");
        assert_eq!(body["refresh_token"], "rotation.secret");
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["user_id"], 42);
        assert_eq!(body["role"], "admin");
    }
}
