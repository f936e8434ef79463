use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedIn {
    pub username: String,
    pub role: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Please enter username and password.")]
    MissingCredentials,
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "bad_params",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Sqlite(_) => "db_query_failed",
        }
    }
}

/// Lowercase hex SHA-256 of the password.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn login(conn: &Connection, username: &str, password: &str) -> Result<SignedIn, AuthError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT password_hash, role FROM users WHERE username = ?",
            [username],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    match row {
        Some((stored, role)) if stored == hash_password(password) => {
            info!(%username, "signed in");
            Ok(SignedIn {
                username: username.to_string(),
                role,
            })
        }
        _ => {
            warn!(%username, "rejected sign-in");
            Err(AuthError::InvalidCredentials)
        }
    }
}
