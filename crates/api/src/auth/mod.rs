//! Authentication primitives and the refresh-session engine.
//!
//! - [`password`] -- pluggable secret hashing ([`password::CredentialVerifier`]).
//! - [`jwt`] -- access-token signing and verification ([`jwt::TokenSigner`]).
//! - [`store`] -- the narrow persistence seam ([`store::SessionStore`]).
//! - [`session`] -- login, refresh rotation, reuse detection, revocation
//!   ([`session::SessionManager`]).

pub mod jwt;
pub mod password;
pub mod session;
pub mod store;
