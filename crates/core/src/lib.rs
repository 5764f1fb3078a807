//! Domain primitives shared by the Orbit database and API crates.
//!
//! Nothing in this crate performs I/O. It owns the identifier and timestamp
//! aliases, the domain error type, the role enumeration, and the wire format
//! of refresh credentials.

pub mod error;
pub mod hashing;
pub mod refresh_token;
pub mod roles;
pub mod types;
