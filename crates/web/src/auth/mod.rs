//! Authentication for the Ecom OS web surfaces.
//!
//! The backend verifies credentials against the shared state database and
//! issues opaque sessions carried in an HttpOnly cookie. Guarded routes go
//! through [`middleware::require_session`], which redirects to the login
//! surface when no valid session is attached.

pub mod backend;
pub mod middleware;
pub mod session;
pub mod types;

pub use backend::{AuthBackend, SqliteAuthBackend};
pub use middleware::{require_session, CurrentIdentity};
pub use session::{SessionStore, SESSION_COOKIE};
pub use types::*;
