//! Local session persistence
//!
//! The session lives in one of two interchangeable media: an ephemeral
//! in-process store, or a durable file-backed store for "remember me"
//! logins. `SessionStore` is the only path through which session state is
//! read or mutated.

use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::Error;
use crate::session::{Persistence, PersistedSession, Session};

/// A synchronous session storage medium. Local persistence never suspends.
pub trait StorageBackend: Send + Sync {
    /// Load the stored session, if any
    fn load(&self) -> Option<PersistedSession>;

    /// Replace the stored session
    fn store(&self, session: &PersistedSession) -> Result<(), Error>;

    /// Remove the stored session; returns whether anything was removed
    fn clear(&self) -> bool;
}

/// Ephemeral in-process storage
#[derive(Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<PersistedSession>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn load(&self) -> Option<PersistedSession> {
        self.slot.lock().unwrap().clone()
    }

    fn store(&self, session: &PersistedSession) -> Result<(), Error> {
        *self.slot.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> bool {
        self.slot.lock().unwrap().take().is_some()
    }
}

/// Durable file-backed storage
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl StorageBackend for FileStorage {
    fn load(&self) -> Option<PersistedSession> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("failed to read session file {}: {}", self.path.display(), err);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(
                    "discarding corrupt session file {}: {}",
                    self.path.display(),
                    err
                );
                None
            }
        }
    }

    fn store(&self, session: &PersistedSession) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(Error::storage)?;
            }
        }

        // Write the full document to a sibling temp file and rename it into
        // place, so a concurrent reader never observes a torn session.
        let temp = self.temp_path();
        let contents = serde_json::to_string(session)?;
        fs::write(&temp, contents).map_err(Error::storage)?;
        fs::rename(&temp, &self.path).map_err(Error::storage)?;
        Ok(())
    }

    fn clear(&self) -> bool {
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
            Err(err) => {
                warn!(
                    "failed to remove session file {}: {}",
                    self.path.display(),
                    err
                );
                false
            }
        }
    }
}

/// The single holder of session state, backed by an ephemeral and a durable
/// medium.
pub struct SessionStore {
    ephemeral: Box<dyn StorageBackend>,
    durable: Box<dyn StorageBackend>,
}

impl SessionStore {
    pub fn new(ephemeral: Box<dyn StorageBackend>, durable: Box<dyn StorageBackend>) -> Self {
        Self { ephemeral, durable }
    }

    /// Both media in memory; sessions do not survive the process
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()), Box::new(MemoryStorage::new()))
    }

    /// Ephemeral medium in memory, durable medium backed by `path`
    pub fn with_session_file(path: &Path) -> Self {
        Self::new(
            Box::new(MemoryStorage::new()),
            Box::new(FileStorage::new(path)),
        )
    }

    /// Read the current session, checking the ephemeral store first.
    ///
    /// A session whose refresh token has expired is no longer refreshable
    /// and is treated as absent. The physical record is left in place so a
    /// later destruction path can still tell whether there was anything to
    /// destroy.
    pub fn read(&self) -> Option<Session> {
        let (persisted, persistence) = match self.ephemeral.load() {
            Some(persisted) => (persisted, Persistence::Ephemeral),
            None => (self.durable.load()?, Persistence::Durable),
        };

        let session = persisted.into_session(persistence);
        if session.is_refresh_token_expired() {
            return None;
        }
        Some(session)
    }

    /// Replace the session wholesale in the medium it selects, clearing the
    /// other medium so a new login fully replaces any prior session.
    pub fn write(&self, session: &Session) -> Result<(), Error> {
        let persisted = PersistedSession::from_session(session);
        match session.persistence {
            Persistence::Ephemeral => {
                self.durable.clear();
                self.ephemeral.store(&persisted)
            }
            Persistence::Durable => {
                self.ephemeral.clear();
                self.durable.store(&persisted)
            }
        }
    }

    /// Remove the session from both media; returns whether anything was
    /// removed. Idempotent, and the return value is what lets logout
    /// emission be deduplicated.
    pub fn clear(&self) -> bool {
        let ephemeral = self.ephemeral.clear();
        let durable = self.durable.clear();
        ephemeral || durable
    }

    /// Whether the stored access token is within `buffer` of expiry
    pub fn is_access_token_expired(&self, buffer: Duration) -> bool {
        match self.read() {
            Some(session) => session.is_access_token_expired(buffer),
            None => true,
        }
    }

    /// Whether the stored refresh token has expired (or no session exists)
    pub fn is_refresh_token_expired(&self) -> bool {
        match self.read() {
            Some(session) => session.is_refresh_token_expired(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::now_ms;
    use serde_json::json;

    fn session(persistence: Persistence) -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            access_token_expires_at: now_ms() + 60_000,
            refresh_token_expires_at: now_ms() + 600_000,
            user: json!({ "id": "u1" }),
            persistence,
        }
    }

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.load().is_none());

        let persisted = PersistedSession::from_session(&session(Persistence::Ephemeral));
        storage.store(&persisted).unwrap();
        assert_eq!(storage.load(), Some(persisted));

        assert!(storage.clear());
        assert!(!storage.clear());
        assert!(storage.load().is_none());
    }

    #[test]
    fn file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        assert!(storage.load().is_none());

        let persisted = PersistedSession::from_session(&session(Persistence::Durable));
        storage.store(&persisted).unwrap();
        assert_eq!(storage.load(), Some(persisted));

        assert!(storage.clear());
        assert!(!storage.clear());
        assert!(storage.load().is_none());
    }

    #[test]
    fn file_storage_discards_corrupt_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(storage.load().is_none());
    }

    #[test]
    fn read_prefers_ephemeral_store() {
        let store = SessionStore::in_memory();

        let mut durable = session(Persistence::Durable);
        durable.access_token = "durable_token".to_string();
        store.write(&durable).unwrap();

        let mut ephemeral = session(Persistence::Ephemeral);
        ephemeral.access_token = "ephemeral_token".to_string();
        store.write(&ephemeral).unwrap();

        let read = store.read().unwrap();
        assert_eq!(read.access_token, "ephemeral_token");
        assert_eq!(read.persistence, Persistence::Ephemeral);
    }

    #[test]
    fn write_replaces_session_in_other_medium() {
        let store = SessionStore::in_memory();

        store.write(&session(Persistence::Durable)).unwrap();
        store.write(&session(Persistence::Ephemeral)).unwrap();

        // Clearing the ephemeral medium must leave nothing behind: the
        // durable copy was replaced by the second write.
        let read = store.read().unwrap();
        assert_eq!(read.persistence, Persistence::Ephemeral);
        assert!(store.clear());
        assert!(store.read().is_none());
    }

    #[test]
    fn durable_write_lands_in_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::with_session_file(&path);

        store.write(&session(Persistence::Durable)).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("authToken"));

        store.write(&session(Persistence::Ephemeral)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn expired_refresh_token_reads_as_absent() {
        let store = SessionStore::in_memory();

        let mut expired = session(Persistence::Ephemeral);
        expired.refresh_token_expires_at = now_ms() - 1_000;
        store.write(&expired).unwrap();

        assert!(store.read().is_none());
        // The physical record is still there to destroy.
        assert!(store.clear());
    }

    #[test]
    fn expiry_predicates_on_empty_store() {
        let store = SessionStore::in_memory();
        assert!(store.is_access_token_expired(Duration::from_secs(60)));
        assert!(store.is_refresh_token_expired());
    }
}
