//! Access-token authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use orbit_core::error::CoreError;
use orbit_core::roles::Role;
use orbit_core::types::DbId;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a Bearer access token.
///
/// Extraction verifies the token's signature, algorithm, and expiry, then
/// reads the session it was issued under. A revoked or expired session
/// rejects the request even while the token itself is still unexpired.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
    /// The user's role at token issuance.
    pub role: Role,
    /// Stable id of the session the token belongs to.
    pub session_id: DbId,
    /// The session's current rotation id (from `claims.rid`).
    pub rotation_id: Uuid,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let access = state.sessions.authorize(token).await?;

        Ok(AuthUser {
            user_id: access.claims.sub,
            role: access.claims.role,
            session_id: access.session.session_id,
            rotation_id: access.session.rotation_id,
        })
    }
}
