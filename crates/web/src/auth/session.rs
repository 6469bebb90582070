//! Session issuance, validation, and teardown.

use axum::http::HeaderMap;
use rusqlite::OptionalExtension;
use tracing::debug;

use ecomos_common::Database;

use super::types::{AuthError, Session};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "ecomos_session";

fn now_epoch_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// SQLite-backed session store.
///
/// Tokens are opaque 32-byte values, hex-encoded. Expired rows are deleted
/// lazily on validation.
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    ttl_secs: i64,
}

impl SessionStore {
    pub fn new(db: Database, ttl_secs: i64) -> Result<Self, AuthError> {
        init_session_schema(&db)?;
        Ok(Self { db, ttl_secs })
    }

    /// Issue a new session for a user.
    pub fn create(&self, user_id: &str) -> Result<Session, AuthError> {
        let now = now_epoch_secs();
        let token = hex::encode(rand::random::<[u8; 32]>());
        let expires_at = now + self.ttl_secs;

        let conn_arc = self.db.connection();
        let conn = conn_arc.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at, last_seen_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![token, user_id, now, expires_at, now],
        )?;

        debug!(user_id, "issued session");
        Ok(Session {
            token,
            user_id: user_id.to_string(),
            created_at: now,
            expires_at,
            last_seen_at: now,
        })
    }

    /// Validate a token. Returns `None` for unknown or expired sessions;
    /// expired rows are removed on the way out.
    pub fn validate(&self, token: &str) -> Result<Option<Session>, AuthError> {
        let now = now_epoch_secs();

        let conn_arc = self.db.connection();
        let conn = conn_arc.lock();

        let row: Option<(String, i64, i64)> = conn
            .query_row(
                "SELECT user_id, created_at, expires_at FROM sessions WHERE token = ?1",
                rusqlite::params![token],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        let (user_id, created_at, expires_at) = match row {
            Some(v) => v,
            None => return Ok(None),
        };

        if expires_at <= now {
            let _ = conn.execute(
                "DELETE FROM sessions WHERE token = ?1",
                rusqlite::params![token],
            );
            return Ok(None);
        }

        conn.execute(
            "UPDATE sessions SET last_seen_at = ?1 WHERE token = ?2",
            rusqlite::params![now, token],
        )?;

        Ok(Some(Session {
            token: token.to_string(),
            user_id,
            created_at,
            expires_at,
            last_seen_at: now,
        }))
    }

    /// Destroy a session. Unknown tokens are a no-op, so sign-out is
    /// idempotent from the user's perspective.
    pub fn destroy(&self, token: &str) -> Result<(), AuthError> {
        let conn_arc = self.db.connection();
        let conn = conn_arc.lock();
        conn.execute(
            "DELETE FROM sessions WHERE token = ?1",
            rusqlite::params![token],
        )?;
        Ok(())
    }
}

fn init_session_schema(db: &Database) -> Result<(), AuthError> {
    let conn_arc = db.connection();
    let conn = conn_arc.lock();
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            last_seen_at INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
        "#,
    )?;
    Ok(())
}

/// Extract the session token from a request's `Cookie` headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(axum::http::header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            if parts.next() == Some(SESSION_COOKIE) {
                if let Some(token) = parts.next() {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }
    None
}

/// `Set-Cookie` value attaching a session token.
pub fn set_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` value clearing the session cookie.
pub fn clear_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    // Sessions reference users(id), so the test user must exist first.
    fn store(ttl_secs: i64) -> SessionStore {
        let db = Database::open_memory().unwrap();
        {
            let conn_arc = db.connection();
            let conn = conn_arc.lock();
            conn.execute(
                "INSERT INTO users (id, email, display_name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params!["usr-1", "a@ecomos.com", "A", "x", 0i64],
            )
            .unwrap();
        }
        SessionStore::new(db, ttl_secs).unwrap()
    }

    #[test]
    fn test_create_validate_destroy() {
        let store = store(3600);
        let session = store.create("usr-1").unwrap();
        assert_eq!(session.token.len(), 64);

        let validated = store.validate(&session.token).unwrap().unwrap();
        assert_eq!(validated.user_id, "usr-1");

        store.destroy(&session.token).unwrap();
        assert!(store.validate(&session.token).unwrap().is_none());

        // Destroying again is a no-op
        store.destroy(&session.token).unwrap();
    }

    #[test]
    fn test_expired_session_is_invalid_and_purged() {
        let store = store(-1);
        let session = store.create("usr-1").unwrap();
        assert!(store.validate(&session.token).unwrap().is_none());
        // Row was purged, a second validate still sees nothing
        assert!(store.validate(&session.token).unwrap().is_none());
    }

    #[test]
    fn test_create_requires_existing_user() {
        let store = store(3600);
        assert!(store.create("usr-unknown").is_err());
    }

    #[test]
    fn test_unknown_token_is_invalid() {
        let store = store(3600);
        assert!(store.validate("deadbeef").unwrap().is_none());
    }

    #[test]
    fn test_token_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "other=1; ecomos_session=abc123".parse().unwrap());
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc123"));

        let mut empty = HeaderMap::new();
        empty.insert(COOKIE, "ecomos_session=".parse().unwrap());
        assert!(token_from_headers(&empty).is_none());
    }
}
