//! Access token persistence.
//!
//! Provides the [`TokenStore`] trait and several implementations:
//! - [`FileTokenStore`] - One `{hash}.token` JSON file per credential pair
//! - [`SqliteTokenStore`] - A single table with upsert semantics (requires `sqlite` feature)
//! - [`CacheTokenStore`] - Any [`KeyValueCache`], namespaced by a key prefix
//!
//! Every backend is keyed by [`credential_hash`] and stores the
//! [`AccessToken`] JSON form. Retrieval never fails: a missing, unreadable
//! or malformed entry is reported as `None`, which the authenticator treats
//! exactly like an expired token.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::WechatError;
use crate::types::AccessToken;

mod cache;
mod file;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use cache::{CacheTokenStore, KeyValueCache, MemoryCache, DEFAULT_KEY_PREFIX};
pub use file::FileTokenStore;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteTokenStore, TableLayout};

/// Derives the cache key for a credential pair.
///
/// Lowercase hex SHA-256 of `app_id || secret`, with no separator. This is a
/// lookup key only; it does not protect the secret.
pub fn credential_hash(app_id: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(app_id.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pluggable persistence for access tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Cache key for a credential pair. All bundled backends use [`credential_hash`].
    fn hash(&self, app_id: &str, secret: &str) -> String {
        credential_hash(app_id, secret)
    }

    /// Look up the token stored under `hash`.
    async fn retrieve(&self, hash: &str) -> Option<AccessToken>;

    /// Persist `token` under `hash`, replacing any previous entry.
    ///
    /// # Errors
    /// Returns `WechatError::Storage` when the backend could not be written.
    async fn store(&self, hash: &str, token: &AccessToken) -> Result<(), WechatError>;
}

#[async_trait]
impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn hash(&self, app_id: &str, secret: &str) -> String {
        (**self).hash(app_id, secret)
    }
    async fn retrieve(&self, hash: &str) -> Option<AccessToken> {
        (**self).retrieve(hash).await
    }
    async fn store(&self, hash: &str, token: &AccessToken) -> Result<(), WechatError> {
        (**self).store(hash, token).await
    }
}

#[async_trait]
impl<T: TokenStore + ?Sized> TokenStore for Box<T> {
    fn hash(&self, app_id: &str, secret: &str) -> String {
        (**self).hash(app_id, secret)
    }
    async fn retrieve(&self, hash: &str) -> Option<AccessToken> {
        (**self).retrieve(hash).await
    }
    async fn store(&self, hash: &str, token: &AccessToken) -> Result<(), WechatError> {
        (**self).store(hash, token).await
    }
}
