//! Access token acquisition for WeChat API
//!
//! [`TokenAuthenticator`] reuses a cached token from a [`TokenStore`] when
//! it is still valid, and otherwise fetches a fresh one from
//! `/cgi-bin/token` and writes it back.
//!
//! Fetches are single-flight per credential hash within one authenticator:
//! concurrent callers for the same credentials wait for the first fetch and
//! then find its token in the store. Separate authenticators (or separate
//! processes) sharing a store are not coordinated; the last write wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::client::WechatClient;
use crate::error::WechatError;
use crate::store::{FileTokenStore, TokenStore};
use crate::types::AccessToken;

const TOKEN_PATH: &str = "/cgi-bin/token";
const GRANT_TYPE: &str = "client_credential";

/// Manages access token acquisition and persistence.
pub struct TokenAuthenticator {
    client: WechatClient,
    store: Arc<dyn TokenStore>,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl TokenAuthenticator {
    /// Authenticator backed by a [`FileTokenStore`] in the OS temp dir.
    pub fn new(client: WechatClient) -> Self {
        Self::with_store(client, Arc::new(FileTokenStore::default()))
    }

    pub fn with_store(client: WechatClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            client,
            store,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &WechatClient {
        &self.client
    }

    pub fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }

    /// Return a valid token for the credentials, using the configured store.
    ///
    /// # Errors
    /// - `WechatError::Authentication` when the token response lacks
    ///   `access_token` or `expires_in`
    /// - `WechatError::Api` when WeChat rejects the credentials
    /// - `WechatError::InvalidResponse` / `WechatError::Http` on transport trouble
    pub async fn authenticate(
        &self,
        app_id: &str,
        secret: &str,
    ) -> Result<AccessToken, WechatError> {
        self.authenticate_with(app_id, secret, self.store.as_ref())
            .await
    }

    /// Same as [`authenticate`](Self::authenticate) against an explicit store.
    pub async fn authenticate_with(
        &self,
        app_id: &str,
        secret: &str,
        store: &dyn TokenStore,
    ) -> Result<AccessToken, WechatError> {
        let hash = store.hash(app_id, secret);

        let lock = self.flight_lock(&hash);
        let result = {
            let _guard = lock.lock().await;
            self.refresh(app_id, secret, &hash, store).await
        };
        self.release_flight(&hash, lock);

        result
    }

    async fn refresh(
        &self,
        app_id: &str,
        secret: &str,
        hash: &str,
        store: &dyn TokenStore,
    ) -> Result<AccessToken, WechatError> {
        if let Some(cached) = store.retrieve(hash).await {
            if cached.is_valid() {
                log::debug!("Using cached access token for {}", app_id);
                return Ok(cached);
            }
            log::debug!("Cached access token for {} has expired", app_id);
        }

        let token = self.fetch_token(app_id, secret).await?;

        // The token is usable whether or not it could be persisted.
        if let Err(e) = store.store(hash, &token).await {
            log::warn!("Failed to persist access token for {}: {}", app_id, e);
        }

        Ok(token)
    }

    /// Authenticate and install the token on the client's session.
    pub async fn activate(&self, app_id: &str, secret: &str) -> Result<AccessToken, WechatError> {
        let token = self.authenticate(app_id, secret).await?;
        self.client.use_token(Some(token.clone()));
        Ok(token)
    }

    fn flight_lock(&self, hash: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(inflight.entry(hash.to_string()).or_default())
    }

    /// Drop the map entry for `hash` once no other caller holds its lock.
    fn release_flight(&self, hash: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut inflight = match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // One reference in the map, one here.
        let owned = inflight
            .get(hash)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock));
        if owned && Arc::strong_count(&lock) == 2 {
            inflight.remove(hash);
        }
    }

    async fn fetch_token(&self, app_id: &str, secret: &str) -> Result<AccessToken, WechatError> {
        log::info!("Fetching access token for {}", app_id);

        let query = [
            ("grant_type", GRANT_TYPE),
            ("appid", app_id),
            ("secret", secret),
        ];
        let request = self
            .client
            .http()
            .get(self.client.url(TOKEN_PATH))
            .query(&query)
            .build()?;

        let response = self.client.send_anonymous(request).await?;
        let body: Value = WechatClient::decode(response)?;

        parse_token_response(&body, Utc::now())
    }
}

/// Build a token from a `/cgi-bin/token` response body.
///
/// The expiry is truncated to whole seconds so it survives every store's
/// serialization unchanged.
fn parse_token_response(body: &Value, now: DateTime<Utc>) -> Result<AccessToken, WechatError> {
    let value = body
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty());
    let expires_in = body.get("expires_in").and_then(Value::as_i64);

    let (Some(value), Some(expires_in)) = (value, expires_in) else {
        return Err(WechatError::Authentication(
            "bad response: expected properties `access_token`, `expires_in`".to_string(),
        ));
    };

    let expires_at = now
        .timestamp()
        .checked_add(expires_in)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| {
            WechatError::Authentication(format!("bad response: `expires_in` out of range: {expires_in}"))
        })?;

    Ok(AccessToken::new(value, expires_at))
}
