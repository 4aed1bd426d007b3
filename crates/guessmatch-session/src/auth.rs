//! Credential checks against a [`UserStore`].
//!
//! Logging in with an unknown username registers it: the first
//! `AuthenticationAttempt` for a name creates the account, later ones
//! must present the same password.

use std::sync::Arc;

use guessmatch_protocol::Credentials;
use sha2::{Digest, Sha256};

use crate::{SessionError, StoreError, UserRecord, UserStore};

/// Hashes a password as lowercase hex SHA-256.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Returns `true` if `password` hashes to `hash`.
pub fn verify_password(password: &str, hash: &str) -> bool {
    hash_password(password) == hash
}

/// Validates credentials and persists score changes.
///
/// Cheap to clone; all clones share the same store. Every method blocks
/// on store I/O.
pub struct Authenticator<S: UserStore> {
    store: Arc<S>,
}

impl<S: UserStore> Clone for Authenticator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: UserStore> Authenticator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Logs in, registering the account if the username is new.
    ///
    /// # Errors
    /// - [`SessionError::AuthFailed`] on a wrong password.
    /// - [`SessionError::Store`] if the store cannot be read or written.
    pub fn login(&self, credentials: &Credentials) -> Result<UserRecord, SessionError> {
        let username = credentials.username.as_str();
        if let Some(record) = self.store.lookup(username)? {
            return Self::check(credentials, record);
        }

        let hash = hash_password(&credentials.password);
        match self.store.create(username, &hash) {
            Ok(record) => Ok(record),
            // Someone registered the name between our lookup and create.
            Err(StoreError::AlreadyExists(_)) => {
                tracing::debug!(username, "lost registration race, checking existing account");
                match self.store.lookup(username)? {
                    Some(record) => Self::check(credentials, record),
                    None => Err(SessionError::AuthFailed("account is being created, try again".into())),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn check(credentials: &Credentials, record: UserRecord) -> Result<UserRecord, SessionError> {
        let username = credentials.username.as_str();
        if verify_password(&credentials.password, &record.password_hash) {
            tracing::debug!(username, "password verified");
            Ok(record)
        } else {
            tracing::info!(username, "wrong password");
            Err(SessionError::AuthFailed("wrong password".into()))
        }
    }

    /// Writes a player's counters back to the store.
    pub fn persist(&self, username: &str, score: u32, games_played: u32) -> Result<(), SessionError> {
        self.store.persist(username, score, games_played)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryUserStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A store whose first lookup misses, as if another connection
    /// registered the name right after it.
    struct RacedStore {
        inner: MemoryUserStore,
        raced: AtomicBool,
    }

    impl RacedStore {
        fn with_existing(username: &str, password: &str) -> Self {
            let inner = MemoryUserStore::new();
            inner.create(username, &hash_password(password)).unwrap();
            Self {
                inner,
                raced: AtomicBool::new(false),
            }
        }
    }

    impl UserStore for RacedStore {
        fn lookup(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.lookup(username)
        }

        fn create(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError> {
            self.inner.create(username, password_hash)
        }

        fn persist(&self, username: &str, score: u32, games_played: u32) -> Result<(), StoreError> {
            self.inner.persist(username, score, games_played)
        }
    }

    fn creds(user: &str, pass: &str) -> Credentials {
        Credentials {
            username: user.into(),
            password: pass.into(),
        }
    }

    fn auth() -> Authenticator<MemoryUserStore> {
        Authenticator::new(Arc::new(MemoryUserStore::new()))
    }

    #[test]
    fn test_hash_password_is_hex_sha256() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(verify_password("abc", &hash_password("abc")));
        assert!(!verify_password("abd", &hash_password("abc")));
    }

    #[test]
    fn test_login_unknown_user_registers_account() {
        let auth = auth();
        let record = auth.login(&creds("alice", "pw")).unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.password_hash, hash_password("pw"));
        assert!(auth.store().lookup("alice").unwrap().is_some());
    }

    #[test]
    fn test_login_known_user_right_password_returns_stored_score() {
        let auth = auth();
        auth.login(&creds("alice", "pw")).unwrap();
        auth.persist("alice", 90, 2).unwrap();

        let record = auth.login(&creds("alice", "pw")).unwrap();
        assert_eq!((record.score, record.games_played), (90, 2));
    }

    #[test]
    fn test_login_wrong_password_fails() {
        let auth = auth();
        auth.login(&creds("alice", "pw")).unwrap();
        let result = auth.login(&creds("alice", "nope"));
        assert!(matches!(result, Err(SessionError::AuthFailed(_))));
    }

    #[test]
    fn test_login_racing_registration_with_same_password_succeeds() {
        let auth = Authenticator::new(Arc::new(RacedStore::with_existing("alice", "pw")));
        let record = auth.login(&creds("alice", "pw")).unwrap();
        assert_eq!(record.username, "alice");
    }

    #[test]
    fn test_login_racing_registration_with_other_password_fails() {
        let auth = Authenticator::new(Arc::new(RacedStore::with_existing("alice", "pw")));
        let result = auth.login(&creds("alice", "nope"));
        assert!(matches!(result, Err(SessionError::AuthFailed(_))));
    }

    #[test]
    fn test_login_store_failure_surfaces_as_store_error() {
        let auth = auth();
        auth.store().set_available(false);
        let result = auth.login(&creds("alice", "pw"));
        assert!(matches!(result, Err(SessionError::Store(StoreError::Unavailable))));
    }
}
