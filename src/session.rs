use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{Store, StoreError};
use crate::models::UserPreference;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("username must not be empty")]
    EmptyUsername,

    #[error("wrong password for {0}")]
    InvalidCredentials(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
    registered: bool,
    offline: bool,
}

impl Session {
    /// Verify `password` for an existing user, or register a new one.
    /// A user row without a password is claimed by the first login.
    pub async fn login(store: &Store, username: &str, password: &str) -> Result<Self, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }

        match store
            .find_password_hash(username)
            .await?
            .filter(|hash| !hash.is_empty())
        {
            Some(stored) => {
                if !verify_password(password, &stored) {
                    warn!(username, "login rejected");
                    return Err(AuthError::InvalidCredentials(username.to_string()));
                }
                info!(username, "logged in");
                Ok(Self {
                    username: username.to_string(),
                    registered: false,
                    offline: false,
                })
            }
            None => {
                let hash = hash_password(password)?;
                store
                    .register_user(username, &hash, &UserPreference::default_for(username))
                    .await?;
                Ok(Self {
                    username: username.to_string(),
                    registered: true,
                    offline: false,
                })
            }
        }
    }

    /// A session for when the store cannot be reached. Credentials are not
    /// checked and nothing the user does is persisted.
    pub fn offline(username: &str) -> Result<Self, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        warn!(username, "store unavailable, working offline");
        Ok(Self {
            username: username.to_string(),
            registered: false,
            offline: true,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn registered(&self) -> bool {
        self.registered
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn logout(self) {
        info!(username = %self.username, "logged out");
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at_path(&dir.path().join("saleasy.sqlite"));
        store.init().await.unwrap();
        (dir, store)
    }

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first));
        assert!(!verify_password("hunter3", &first));
        assert!(!verify_password("hunter2", "plain-text"));
    }

    #[tokio::test]
    async fn first_login_registers_the_user() {
        let (_dir, store) = temp_store().await;

        let session = Session::login(&store, "alice", "secret").await.unwrap();
        assert_eq!(session.username(), "alice");
        assert!(session.registered());
        assert!(!session.is_offline());

        let stored = store.find_password_hash("alice").await.unwrap().unwrap();
        assert_ne!(stored, "secret");
        assert!(verify_password("secret", &stored));
    }

    #[tokio::test]
    async fn returning_user_must_match_password() {
        let (_dir, store) = temp_store().await;
        Session::login(&store, "alice", "secret").await.unwrap();

        let again = Session::login(&store, "alice", "secret").await.unwrap();
        assert!(!again.registered());

        let err = Session::login(&store, "alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(name) if name == "alice"));
    }

    #[test]
    fn offline_session_keeps_the_username() {
        let session = Session::offline(" alice ").unwrap();
        assert_eq!(session.username(), "alice");
        assert!(session.is_offline());
        assert!(!session.registered());
        assert!(matches!(Session::offline(""), Err(AuthError::EmptyUsername)));
    }

    #[tokio::test]
    async fn blank_username_is_rejected() {
        let (_dir, store) = temp_store().await;

        let err = Session::login(&store, "   ", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::EmptyUsername));
    }
}
