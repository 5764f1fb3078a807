//! Advisory client metadata recorded on sessions.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::auth::session::ClientInfo;

/// Longest `User-Agent` stored on a session row.
const MAX_USER_AGENT_LEN: usize = 512;

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientInfo {
            ip: forwarded_for(&parts.headers).or(peer),
            user_agent: user_agent(&parts.headers),
        })
    }
}

/// First hop of `X-Forwarded-For`, if present and non-empty.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_owned)
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    let ua = headers.get(USER_AGENT)?.to_str().ok()?.trim();
    if ua.is_empty() {
        return None;
    }
    Some(ua.chars().take(MAX_USER_AGENT_LEN).collect())
}
