//! Orbit auth service library.
//!
//! Exposes the session engine (token signer, credential verifier, session
//! store seam, session manager), the HTTP boundary built on it, and the
//! configuration and state types, so integration tests and the binary
//! entrypoint can both access them.

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
