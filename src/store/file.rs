use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::TokenStore;
use crate::error::WechatError;
use crate::types::AccessToken;

/// File-based token storage.
///
/// Stores one token per credential pair at `{dir}/{hash}.token`. The
/// default directory is the OS temp dir, so entries may disappear at the
/// OS's discretion; that only costs an extra token fetch.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the token file for `hash`.
    pub fn token_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{hash}.token"))
    }
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn retrieve(&self, hash: &str) -> Option<AccessToken> {
        let path = self.token_path(hash);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("Failed to read token file '{}': {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                log::debug!("Ignoring malformed token file '{}': {}", path.display(), e);
                None
            }
        }
    }

    async fn store(&self, hash: &str, token: &AccessToken) -> Result<(), WechatError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            WechatError::Storage(format!(
                "Failed to create token directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let path = self.token_path(hash);
        let content = serde_json::to_vec(token)?;

        // Readers must never observe a half-written file.
        let temp_path = path.with_extension("token.tmp");
        tokio::fs::write(&temp_path, &content).await.map_err(|e| {
            WechatError::Storage(format!(
                "Failed to write token file '{}': {}",
                temp_path.display(),
                e
            ))
        })?;
        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            WechatError::Storage(format!(
                "Failed to move token file into place '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
