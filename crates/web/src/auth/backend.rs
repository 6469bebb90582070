//! Credential verification against the state database.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use password_hash::{PasswordHash, SaltString};
use rusqlite::OptionalExtension;

use ecomos_common::{Database, Identity};

use super::types::{AuthError, Credential};

fn now_epoch_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Trait for credential-verifying backends.
///
/// Callers must not assume validity: both outcomes (an [`Identity`] or a
/// descriptive [`AuthError`]) are ordinary results of a submission.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Verify a credential pair, returning the identity it belongs to.
    async fn authenticate(&self, credential: &Credential) -> Result<Identity, AuthError>;

    /// Look up an identity by id (used by session validation).
    async fn identity_by_id(&self, id: &str) -> Result<Option<Identity>, AuthError>;
}

/// SQLite-backed credential verification with Argon2 password hashes.
#[derive(Clone)]
pub struct SqliteAuthBackend {
    db: Database,
}

impl SqliteAuthBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert an identity with a freshly hashed password. Replaces any
    /// existing row for the same email, so repeated seeding is harmless.
    /// The email is normalized the same way `authenticate` normalizes its
    /// input, so the stored row is always reachable.
    pub fn seed_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        let email = email.trim().to_lowercase();
        let hash = hash_password(password)?;
        let id = format!("usr-{}", hex::encode(rand::random::<[u8; 8]>()));
        let now = now_epoch_secs();

        let conn_arc = self.db.connection();
        let conn = conn_arc.lock();
        conn.execute(
            "INSERT INTO users (id, email, display_name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)\
             ON CONFLICT(email) DO UPDATE SET display_name=?3, password_hash=?4",
            rusqlite::params![id, email, display_name, hash, now],
        )?;

        // The conflict branch keeps the original id, so read it back.
        let (id, created_at): (String, i64) = conn.query_row(
            "SELECT id, created_at FROM users WHERE email = ?1",
            rusqlite::params![email],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        Ok(Identity {
            id,
            email,
            display_name: display_name.to_string(),
            created_at,
        })
    }
}

#[async_trait]
impl AuthBackend for SqliteAuthBackend {
    async fn authenticate(&self, credential: &Credential) -> Result<Identity, AuthError> {
        let email = credential.email.trim().to_lowercase();

        let conn_arc = self.db.connection();
        let conn = conn_arc.lock();

        let row: Option<(String, String, String, i64)> = conn
            .query_row(
                "SELECT id, display_name, password_hash, created_at FROM users WHERE email = ?1",
                rusqlite::params![email],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;

        let (id, display_name, password_hash, created_at) = match row {
            Some(v) => v,
            None => return Err(AuthError::InvalidCredentials),
        };

        if !verify_password(&password_hash, &credential.password) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Identity {
            id,
            email,
            display_name,
            created_at,
        })
    }

    async fn identity_by_id(&self, id: &str) -> Result<Option<Identity>, AuthError> {
        let conn_arc = self.db.connection();
        let conn = conn_arc.lock();

        let row: Option<(String, String, i64)> = conn
            .query_row(
                "SELECT email, display_name, created_at FROM users WHERE id = ?1",
                rusqlite::params![id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        Ok(row.map(|(email, display_name, created_at)| Identity {
            id: id.to_string(),
            email,
            display_name,
            created_at,
        }))
    }
}

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt_bytes = rand::random::<[u8; 16]>();
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Internal(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Verify a password against a PHC string. Unparseable hashes verify false.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteAuthBackend {
        SqliteAuthBackend::new(Database::open_memory().unwrap())
    }

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hash = hash_password("SecurePass123!").unwrap();
        assert!(verify_password(&hash, "SecurePass123!"));
        assert!(!verify_password(&hash, "WrongPass"));
        assert!(!verify_password("not-a-phc-string", "SecurePass123!"));
    }

    #[tokio::test]
    async fn test_authenticate_accepts_seeded_credential() {
        let backend = backend();
        backend
            .seed_user("jarraramjad@ecomos.com", "SecurePass123!", "Jarrar Amjad")
            .unwrap();

        let identity = backend
            .authenticate(&Credential {
                email: "jarraramjad@ecomos.com".into(),
                password: "SecurePass123!".into(),
            })
            .await
            .unwrap();
        assert_eq!(identity.display_name, "Jarrar Amjad");
    }

    #[tokio::test]
    async fn test_authenticate_rejects_bad_password_and_unknown_email() {
        let backend = backend();
        backend
            .seed_user("jarraramjad@ecomos.com", "SecurePass123!", "Jarrar Amjad")
            .unwrap();

        let err = backend
            .authenticate(&Credential {
                email: "jarraramjad@ecomos.com".into(),
                password: "nope".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = backend
            .authenticate(&Credential {
                email: "nobody@ecomos.com".into(),
                password: "SecurePass123!".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_denied_access() {
        let backend = backend();
        {
            let conn_arc = backend.db.connection();
            let conn = conn_arc.lock();
            conn.execute_batch("DROP TABLE users;").unwrap();
        }

        let err = backend
            .authenticate(&Credential {
                email: "jarraramjad@ecomos.com".into(),
                password: "SecurePass123!".into(),
            })
            .await
            .unwrap_err();
        let notice = err.notice();
        assert!(notice.contains("sqlite"), "notice: {notice}");
        assert!(notice.contains("denied access"), "notice: {notice}");
    }

    #[tokio::test]
    async fn test_seed_normalizes_email_case() {
        let backend = backend();
        let seeded = backend
            .seed_user(" Jarrar.Amjad@EcomOS.com ", "SecurePass123!", "Jarrar Amjad")
            .unwrap();
        assert_eq!(seeded.email, "jarrar.amjad@ecomos.com");

        let identity = backend
            .authenticate(&Credential {
                email: "jarrar.amjad@ecomos.com".into(),
                password: "SecurePass123!".into(),
            })
            .await
            .unwrap();
        assert_eq!(identity.id, seeded.id);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent_per_email() {
        let backend = backend();
        let first = backend.seed_user("a@ecomos.com", "pw1", "A").unwrap();
        let second = backend.seed_user("a@ecomos.com", "pw2", "A2").unwrap();
        assert_eq!(first.id, second.id);

        let identity = backend
            .authenticate(&Credential {
                email: "a@ecomos.com".into(),
                password: "pw2".into(),
            })
            .await
            .unwrap();
        assert_eq!(identity.display_name, "A2");
    }
}
