///! Durable storage for the session token and role
///!
///! Token and role always travel as one record: a store either holds both or
///! nothing. `FileTokenStore` keeps the record in
///! `~/.config/kubeswitch/session.toml` with owner-only permissions and
///! replaces it atomically.

use chrono::{DateTime, Utc};
use kubeswitch_common::{Error, Result, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Persisted half of a session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAuth {
    pub token: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
}

impl fmt::Debug for StoredAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredAuth")
            .field("token", &"<redacted>")
            .field("role", &self.role)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Storage backend for the persisted session record
pub trait TokenStore: Send {
    /// Returns `Ok(None)` when nothing (or only part of a record) is stored
    fn load(&self) -> Result<Option<StoredAuth>>;

    /// Replace the stored record
    fn save(&mut self, auth: &StoredAuth) -> Result<()>;

    /// Remove the stored record; succeeds when nothing is stored
    fn clear(&mut self) -> Result<()>;
}

/// On-disk layout; every field optional so a truncated file can be detected
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    token: Option<String>,
    role: Option<Role>,
    issued_at: Option<DateTime<Utc>>,
}

/// File-backed token store
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    file_path: PathBuf,
}

impl FileTokenStore {
    pub fn default_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| Error::Config("HOME is not set".to_string()))?;
        Ok(PathBuf::from(home).join(".config/kubeswitch/session.toml"))
    }

    pub fn new() -> Result<Self> {
        Ok(Self::with_path(Self::default_path()?))
    }

    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredAuth>> {
        if !self.file_path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.file_path)?;
        let file: SessionFile = match toml::from_str(&contents) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    path = %self.file_path.display(),
                    error = %e,
                    "ignoring unreadable session file"
                );
                return Ok(None);
            }
        };

        match (file.token, file.role) {
            (Some(token), Some(role)) if !token.is_empty() => Ok(Some(StoredAuth {
                token,
                role,
                issued_at: file.issued_at.unwrap_or_else(Utc::now),
            })),
            _ => {
                warn!(path = %self.file_path.display(), "ignoring incomplete session record");
                Ok(None)
            }
        }
    }

    fn save(&mut self, auth: &StoredAuth) -> Result<()> {
        let file = SessionFile {
            token: Some(auth.token.clone()),
            role: Some(auth.role),
            issued_at: Some(auth.issued_at),
        };
        let contents = toml::to_string_pretty(&file)
            .map_err(|e| Error::Config(format!("failed to serialize session: {}", e)))?;

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write aside and rename so readers never see half a record
        let tmp_path = self.file_path.with_extension("toml.tmp");
        match fs::remove_file(&tmp_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        // Created owner-only so the token is never readable by others
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut tmp = options.open(&tmp_path)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.file_path)?;
        debug!(path = %self.file_path.display(), "session record saved");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.file_path) {
            Ok(()) => {
                debug!(path = %self.file_path.display(), "session record removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory token store for tests and embedding.
///
/// Clones share the same slot, so a test can keep a handle while the
/// session manager owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<StoredAuth>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<StoredAuth>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredAuth>> {
        Ok(self.lock().clone())
    }

    fn save(&mut self, auth: &StoredAuth) -> Result<()> {
        *self.lock() = Some(auth.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        *self.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> StoredAuth {
        StoredAuth {
            token: "tok-123".to_string(),
            role: Role::User,
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn test_file_store_roundtrip_and_clear() {
        let dir = TempDir::new().unwrap();
        let mut store = FileTokenStore::with_path(dir.path().join("nested/session.toml"));

        assert!(store.load().unwrap().is_none());
        store.save(&sample()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.token, "tok-123");
        assert_eq!(loaded.role, Role::User);

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let mut store = FileTokenStore::with_path(dir.path().join("session.toml"));

        // A world-readable leftover from an interrupted save must not be reused
        let leftover = dir.path().join("session.toml.tmp");
        fs::write(&leftover, "stale").unwrap();
        fs::set_permissions(&leftover, fs::Permissions::from_mode(0o644)).unwrap();

        store.save(&sample()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!leftover.exists());
        assert_eq!(store.load().unwrap().unwrap().token, "tok-123");
    }

    #[test]
    fn test_incomplete_record_is_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.toml");
        fs::write(&path, "token = \"orphan\"\n").unwrap();

        let store = FileTokenStore::with_path(path.clone());
        assert!(store.load().unwrap().is_none());

        fs::write(&path, "role = \"admin\"\n").unwrap();
        assert!(store.load().unwrap().is_none());

        fs::write(&path, "not toml at all [[[").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_memory_store_shares_slot() {
        let handle = MemoryTokenStore::new();
        let mut owned = handle.clone();

        owned.save(&sample()).unwrap();
        assert!(handle.load().unwrap().is_some());

        owned.clear().unwrap();
        assert!(handle.load().unwrap().is_none());
    }
}
