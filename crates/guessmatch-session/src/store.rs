//! Credential and score persistence.
//!
//! The server only ever talks to a [`UserStore`]: look a user up, create
//! one, persist score changes. [`FileUserStore`] keeps everything in one
//! JSON file guarded by a single read/write lock, since a flat file has
//! no concurrency control of its own. [`MemoryUserStore`] is the same
//! contract without the disk, for tests and throwaway servers.
//!
//! All methods block. Callers on an async runtime must run them on the
//! blocking pool (`tokio::task::spawn_blocking`).

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// One stored account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    /// Hex SHA-256 of the password.
    pub password_hash: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub games_played: u32,
}

/// Errors from the backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("user {0} already exists")]
    AlreadyExists(String),

    #[error("user {0} does not exist")]
    UnknownUser(String),

    #[error("store unavailable")]
    Unavailable,
}

/// The persistence contract the server consumes.
pub trait UserStore: Send + Sync + 'static {
    /// Returns the record for `username`, or `None` if there is none.
    fn lookup(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Creates a fresh account with zero score.
    ///
    /// # Errors
    /// [`StoreError::AlreadyExists`] if the username is taken.
    fn create(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError>;

    /// Overwrites the score and games-played counters of an account.
    fn persist(&self, username: &str, score: u32, games_played: u32) -> Result<(), StoreError>;
}

type Users = BTreeMap<String, UserRecord>;

fn new_record(username: &str, password_hash: &str) -> UserRecord {
    UserRecord {
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        score: 0,
        games_played: 0,
    }
}

// ---------------------------------------------------------------------------
// FileUserStore
// ---------------------------------------------------------------------------

/// A [`UserStore`] backed by a single JSON file.
///
/// Every operation reads the whole file; writes go to a sibling temp file
/// that is then renamed over the original, so a crash mid-write leaves
/// the previous contents intact.
#[derive(Debug)]
pub struct FileUserStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileUserStore {
    /// Opens (without touching) the store at `path`. A missing file is an
    /// empty store and is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Users, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(Users::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Users::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, users: &Users) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(users)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl UserStore for FileUserStore {
    fn lookup(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(username))
    }

    fn create(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut users = self.load()?;
        if users.contains_key(username) {
            return Err(StoreError::AlreadyExists(username.to_string()));
        }
        let record = new_record(username, password_hash);
        users.insert(username.to_string(), record.clone());
        self.save(&users)?;
        tracing::info!(username, "account created");
        Ok(record)
    }

    fn persist(&self, username: &str, score: u32, games_played: u32) -> Result<(), StoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut users = self.load()?;
        let record = users
            .get_mut(username)
            .ok_or_else(|| StoreError::UnknownUser(username.to_string()))?;
        record.score = score;
        record.games_played = games_played;
        self.save(&users)?;
        tracing::debug!(username, score, games_played, "account persisted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryUserStore
// ---------------------------------------------------------------------------

/// A [`UserStore`] held entirely in memory.
///
/// [`set_available`](Self::set_available) simulates a broken backing
/// medium: while unavailable every call fails with
/// [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Users>,
    unavailable: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }
}

impl UserStore for MemoryUserStore {
    fn lookup(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        self.check()?;
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(username).cloned())
    }

    fn create(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError> {
        self.check()?;
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(username) {
            return Err(StoreError::AlreadyExists(username.to_string()));
        }
        let record = new_record(username, password_hash);
        users.insert(username.to_string(), record.clone());
        Ok(record)
    }

    fn persist(&self, username: &str, score: u32, games_played: u32) -> Result<(), StoreError> {
        self.check()?;
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let record = users
            .get_mut(username)
            .ok_or_else(|| StoreError::UnknownUser(username.to_string()))?;
        record.score = score;
        record.games_played = games_played;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, FileUserStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileUserStore::new(dir.path().join("users.json"));
        (dir, store)
    }

    #[test]
    fn test_file_lookup_missing_file_returns_none() {
        let (_dir, store) = temp_store();
        assert_eq!(store.lookup("alice").unwrap(), None);
    }

    #[test]
    fn test_file_create_then_lookup_returns_record() {
        let (_dir, store) = temp_store();
        let created = store.create("alice", "abc123").unwrap();
        assert_eq!(created.score, 0);

        let found = store.lookup("alice").unwrap().expect("should exist");
        assert_eq!(found, created);
    }

    #[test]
    fn test_file_create_duplicate_returns_already_exists() {
        let (_dir, store) = temp_store();
        store.create("alice", "h").unwrap();
        let result = store.create("alice", "h");
        assert!(matches!(result, Err(StoreError::AlreadyExists(u)) if u == "alice"));
    }

    #[test]
    fn test_file_persist_survives_reopen() {
        let (dir, store) = temp_store();
        store.create("bob", "h").unwrap();
        store.persist("bob", 250, 3).unwrap();

        let reopened = FileUserStore::new(dir.path().join("users.json"));
        let record = reopened.lookup("bob").unwrap().unwrap();
        assert_eq!((record.score, record.games_played), (250, 3));
    }

    #[test]
    fn test_file_persist_unknown_user_fails() {
        let (_dir, store) = temp_store();
        let result = store.persist("ghost", 1, 1);
        assert!(matches!(result, Err(StoreError::UnknownUser(_))));
    }

    #[test]
    fn test_file_corrupt_contents_surface_as_error() {
        let (_dir, store) = temp_store();
        std::fs::write(store.path(), b"not json").unwrap();
        assert!(matches!(store.lookup("alice"), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_memory_unavailable_fails_every_call() {
        let store = MemoryUserStore::new();
        store.create("alice", "h").unwrap();
        store.set_available(false);

        assert!(matches!(store.lookup("alice"), Err(StoreError::Unavailable)));
        assert!(matches!(store.persist("alice", 1, 1), Err(StoreError::Unavailable)));

        store.set_available(true);
        assert!(store.lookup("alice").unwrap().is_some());
    }
}
