//! Admin-only session management.

use axum::extract::{Path, State};
use axum::Json;
use orbit_core::error::CoreError;
use orbit_core::types::DbId;
use orbit_db::repositories::UserRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for a bulk revocation.
#[derive(Debug, Serialize)]
pub struct RevokedSessions {
    pub user_id: DbId,
    pub revoked: u64,
}

/// DELETE /api/v1/admin/users/{id}/sessions
///
/// Revoke every session of a user, signing them out everywhere.
pub async fn revoke_user_sessions(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<RevokedSessions>>> {
    if UserRepo::find_by_id(&state.pool, user_id).await?.is_none() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }));
    }

    let revoked = state.sessions.revoke_all(user_id).await?;
    tracing::info!(
        admin_id = admin.user_id,
        user_id,
        revoked,
        "Admin revoked user sessions"
    );

    Ok(Json(DataResponse {
        data: RevokedSessions { user_id, revoked },
    }))
}
