//! Request extractors for authentication, authorization, and client metadata.
//!
//! - [`auth::AuthUser`] -- Verifies the Bearer access token and its live session.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.
//! - [`rbac::RequireAuth`] -- Requires any authenticated user.
//! - [`client`] -- [`ClientInfo`](crate::auth::session::ClientInfo) from
//!   forwarding headers and the peer address.

pub mod auth;
pub mod client;
pub mod rbac;
