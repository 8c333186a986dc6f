use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::TokenStore;
use crate::error::WechatError;
use crate::types::AccessToken;

pub const DEFAULT_KEY_PREFIX: &str = "wechatToken:";

/// Minimal string key-value cache contract.
///
/// Implement this for a distributed cache client to back a [`CacheTokenStore`].
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, WechatError>;

    /// Set `key` with no expiry.
    async fn set(&self, key: &str, value: String) -> Result<(), WechatError>;
}

#[async_trait]
impl<T: KeyValueCache + ?Sized> KeyValueCache for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, WechatError> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: String) -> Result<(), WechatError> {
        (**self).set(key, value).await
    }
}

/// In-process [`KeyValueCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, WechatError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), WechatError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Token storage on top of a [`KeyValueCache`].
///
/// Keys are `{prefix}{hash}`. Entries are written without a TTL; the
/// token's own expiry decides validity.
#[derive(Debug)]
pub struct CacheTokenStore<C> {
    cache: C,
    prefix: String,
}

impl<C: KeyValueCache> CacheTokenStore<C> {
    pub fn new(cache: C) -> Self {
        Self {
            cache,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    fn key(&self, hash: &str) -> String {
        format!("{}{}", self.prefix, hash)
    }
}

#[async_trait]
impl<C: KeyValueCache> TokenStore for CacheTokenStore<C> {
    async fn retrieve(&self, hash: &str) -> Option<AccessToken> {
        let key = self.key(hash);
        let raw = match self.cache.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Token cache lookup for '{}' failed: {}", key, e);
                return None;
            }
        };

        serde_json::from_str(&raw)
            .map_err(|e| log::debug!("Ignoring malformed cache entry '{}': {}", key, e))
            .ok()
    }

    async fn store(&self, hash: &str, token: &AccessToken) -> Result<(), WechatError> {
        let value = serde_json::to_string(token)?;
        self.cache.set(&self.key(hash), value).await
    }
}
