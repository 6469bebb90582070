//! Core types for the authentication flow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A credential pair as submitted by the login form. Consumed once per
/// submission, never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

/// Session data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_seen_at: i64,
}

/// Failure modes of an authentication attempt.
///
/// The rendered message is the ErrorNotice contract: credential rejection
/// stays generic, while infrastructure failures name the failing subsystem
/// and the access-denial reason so the operator can diagnose them from the
/// login page alone.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("storage backend '{subsystem}' denied access: {cause}")]
    StorageDenied { subsystem: String, cause: String },

    #[error("internal auth error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Text rendered inside the login page's error notice.
    pub fn notice(&self) -> String {
        self.to_string()
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(e: rusqlite::Error) -> Self {
        AuthError::StorageDenied {
            subsystem: "sqlite".to_string(),
            cause: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_denied_notice_names_subsystem() {
        let e = AuthError::StorageDenied {
            subsystem: "sqlite".into(),
            cause: "no such table: users".into(),
        };
        let notice = e.notice();
        assert!(notice.contains("sqlite"));
        assert!(notice.contains("denied access"));
    }

    #[test]
    fn test_rejection_notice_stays_generic() {
        assert_eq!(AuthError::InvalidCredentials.notice(), "Invalid email or password");
    }
}
