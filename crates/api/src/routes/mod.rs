pub mod admin;
pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                                   register (public)
/// /auth/login                                      login (public)
/// /auth/refresh                                    refresh (public)
/// /auth/logout                                     logout (refresh token in body)
/// /auth/logout-all                                 revoke all own sessions (requires auth)
/// /auth/me                                         current user (requires auth)
/// /auth/sessions                                   own active sessions (requires auth)
///
/// /admin/users/{id}/sessions                       revoke all sessions (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
}
