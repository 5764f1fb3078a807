//! Route definitions for `/admin`.

use axum::routing::delete;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// DELETE /users/{id}/sessions  -> revoke_user_sessions
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/users/{id}/sessions",
        delete(admin::revoke_user_sessions),
    )
}
