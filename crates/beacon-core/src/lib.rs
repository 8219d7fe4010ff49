//! # beacon-core
//!
//! Core crate for the Beacon broker. Contains configuration schemas,
//! the typed broker event bus, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Beacon crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
