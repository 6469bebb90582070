//! Ecom OS Web
//!
//! Server-rendered administrative surfaces: login, app selector, and the
//! Warehouse Management shell, with session-cookie authentication.

pub mod auth;
pub mod pages;
pub mod server;

pub use server::{WebServer, WebServerConfig};
