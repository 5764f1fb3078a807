//! Row structs and insert/update DTOs.

pub mod session;
pub mod user;
