//! Durable storage for the access/refresh token pair.

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use shared::models::CredentialPair;
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Tokens as persisted. Either slot may be empty; see [`StoredTokens::pair`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    /// Stored access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Stored refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl StoredTokens {
    /// The complete pair, or `None` when either token is missing.
    #[must_use]
    pub fn pair(&self) -> Option<CredentialPair> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            _ => None,
        }
    }

    /// True when neither token is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

impl From<&CredentialPair> for StoredTokens {
    fn from(pair: &CredentialPair) -> Self {
        Self {
            access_token: Some(pair.access_token.clone()),
            refresh_token: Some(pair.refresh_token.clone()),
        }
    }
}

impl fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Key/value persistence for the credential pair.
///
/// Implementations never fail for a missing token, only for a broken medium.
/// `set` replaces both tokens at once; no reader observes half of a pair.
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// Whatever is currently persisted, possibly partial.
    fn get(&self) -> Result<StoredTokens, StorageError>;

    /// Replace both tokens.
    fn set(&self, pair: &CredentialPair) -> Result<(), StorageError>;

    /// Remove both tokens.
    fn clear(&self) -> Result<(), StorageError>;

    /// Cheap check used by bootstrap to decide whether to attempt restoration.
    fn has_access_token(&self) -> Result<bool, StorageError> {
        Ok(self.get()?.access_token.is_some())
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("token store lock poisoned".to_string())
}

/// In-process token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<StoredTokens>,
}

impl MemoryTokenStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `tokens`, which may be partial.
    #[must_use]
    pub fn with_tokens(tokens: StoredTokens) -> Self {
        Self {
            tokens: Mutex::new(tokens),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<StoredTokens, StorageError> {
        self.tokens
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| poisoned())
    }

    fn set(&self, pair: &CredentialPair) -> Result<(), StorageError> {
        let mut guard = self.tokens.lock().map_err(|_| poisoned())?;
        *guard = StoredTokens::from(pair);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self.tokens.lock().map_err(|_| poisoned())?;
        *guard = StoredTokens::default();
        Ok(())
    }
}

/// Token store backed by a JSON file holding `access_token` and `refresh_token`.
///
/// Writes land in a sibling temp file that is renamed over the target.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Store persisting to `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the token file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "tokens.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write(&self, tokens: &StoredTokens) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }

        let contents = serde_json::to_vec_pretty(tokens).map_err(|err| StorageError::Corrupt {
            path: self.path.clone(),
            message: err.to_string(),
        })?;

        let temp = self.temp_path();
        fs::write(&temp, contents).map_err(|err| self.io_error(err))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp, fs::Permissions::from_mode(0o600))
                .map_err(|err| self.io_error(err))?;
        }
        fs::rename(&temp, &self.path).map_err(|err| self.io_error(err))
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<StoredTokens, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(StoredTokens::default()),
            Err(err) => return Err(self.io_error(err)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoredTokens::default());
        }
        serde_json::from_slice(&bytes).map_err(|err| StorageError::Corrupt {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    fn set(&self, pair: &CredentialPair) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| poisoned())?;
        self.write(&StoredTokens::from(pair))
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| poisoned())?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}
