//! Ecom OS Common Library
//!
//! Shared types, errors, and state persistence for the Ecom OS platform.

pub mod db;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

/// Ecom OS version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
