//! Session handling: where bearer tokens live between runs, and the auth
//! gate that decides whether they still mean anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::log::*;

pub mod auth;

pub use auth::{AuthState, AuthStore};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Key/value storage for tokens, keyed by [`ACCESS_TOKEN_KEY`] and
/// [`REFRESH_TOKEN_KEY`].
#[async_trait]
pub trait TokenStore: std::fmt::Debug + Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), ApiError>;

    async fn remove(&self, key: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens<S: Into<String>>(access: S, refresh: S) -> Self {
        let mut values = HashMap::new();
        values.insert(ACCESS_TOKEN_KEY.to_string(), access.into());
        values.insert(REFRESH_TOKEN_KEY.to_string(), refresh.into());
        Self {
            values: Mutex::new(values),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ApiError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

/// Tokens persisted as a flat JSON object in a file. The lock serialises
/// read-modify-write cycles within this process. On unix the file is kept
/// readable by its owner only.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<HashMap<String, String>, ApiError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| storage_error(&self.path, e))
    }

    async fn write(&self, values: &HashMap<String, String>) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, e))?;
        }
        let raw =
            serde_json::to_string_pretty(values).map_err(|e| storage_error(&self.path, e))?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(TOKEN_FILE_MODE);
        let mut file = options
            .open(&self.path)
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        // `mode` only applies when the file is created.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(TOKEN_FILE_MODE))
                .await
                .map_err(|e| storage_error(&self.path, e))?;
        }
        file.write_all(raw.as_bytes())
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        file.flush().await.map_err(|e| storage_error(&self.path, e))
    }
}

#[cfg(unix)]
const TOKEN_FILE_MODE: u32 = 0o600;

fn storage_error(path: &Path, e: impl std::fmt::Display) -> ApiError {
    error!("token storage at {} failed: {e}", path.display());
    ApiError::Storage(format!("{}: {e}", path.display()))
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let _guard = self.lock.lock().await;
        let mut values = self.read().await?;
        values.insert(key.to_string(), value.to_string());
        self.write(&values).await
    }

    async fn remove(&self, key: &str) -> Result<(), ApiError> {
        let _guard = self.lock.lock().await;
        let mut values = self.read().await?;
        if values.remove(key).is_some() {
            self.write(&values).await?;
        }
        Ok(())
    }
}
