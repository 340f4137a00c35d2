/*
[INPUT]:  Session key names and a storage directory
[OUTPUT]: Durable key/value persistence for session fields
[POS]:    Session layer - persistence backends for the token store
[UPDATE]: When storage layout or key naming conventions change
*/

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Storage key holding the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key holding the conservative expiry as unix milliseconds
pub const EXPIRES_AT_KEY: &str = "tokenExpiresAt";

/// Durable client storage for session fields.
///
/// Each field lives under its own key. On load an access token without a
/// readable expiry is kept but treated as already due.
pub trait SessionStorage: fmt::Debug + Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// Process-local storage, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        let guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        guard.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let mut guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        guard.remove(key);
        Ok(())
    }
}

/// One file per key inside a directory, readable only by the owner
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(sanitized)
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let content = fs::read_to_string(self.key_path(key)).ok()?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_string())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.key_path(key);
        fs::write(&path, value)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}
