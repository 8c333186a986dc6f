//! WeChat HTTP Client
//!
//! Owns the request pipeline and the session's current access token.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tower::{ServiceBuilder, ServiceExt};

use super::transport::{HttpTransport, WechatResponse};
use crate::error::WechatError;
use crate::middleware::{
    DeveloperModeLayer, HostRewrites, LoggingMiddleware, ResponseValidationLayer, SessionToken,
    TokenInjectionLayer, DEFAULT_SANDBOX_HOSTS,
};
use crate::types::AccessToken;

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.weixin.qq.com";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// WeChat API Client
///
/// Every request runs through response validation, developer-mode host
/// rewriting, access token injection and logging (see
/// [`middleware`](crate::middleware)).
///
/// Clones share one session: a token installed with
/// [`use_token`](Self::use_token) on any clone is injected by all of them.
/// Build a separate client per logical session.
#[derive(Clone)]
pub struct WechatClient {
    http: Client,
    base_url: String,
    session: SessionToken,
    developer_mode: bool,
    rewrites: HostRewrites,
    logging: LoggingMiddleware,
}

impl std::fmt::Debug for WechatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatClient")
            .field("base_url", &self.base_url)
            .field("developer_mode", &self.developer_mode)
            .field("has_token", &self.session.get().is_some())
            .finish_non_exhaustive()
    }
}

impl WechatClient {
    /// Create a new client builder
    pub fn builder() -> WechatClientBuilder {
        WechatClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether production hosts are rewritten to sandbox hosts.
    pub fn developer_mode(&self) -> bool {
        self.developer_mode
    }

    /// Returns the underlying [`reqwest::Client`] for building requests.
    ///
    /// Requests executed directly on this client bypass the middleware
    /// pipeline; pass them to [`send`](Self::send) instead.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Set or clear the session's access token, returning the previous one.
    pub fn use_token(&self, token: Option<AccessToken>) -> Option<AccessToken> {
        self.session.set(token)
    }

    /// The session's current access token.
    pub fn token(&self) -> Option<AccessToken> {
        self.session.get()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request through the full pipeline, injecting the session token.
    ///
    /// # Errors
    /// - `WechatError::Http` for transport failures
    /// - `WechatError::InvalidResponse` when a 2xx body is not JSON
    /// - `WechatError::Api` when a 2xx body carries `errcode != 0`
    pub async fn send(&self, request: reqwest::Request) -> Result<WechatResponse, WechatError> {
        self.dispatch(request, self.session.clone()).await
    }

    /// Like [`send`](Self::send), but never injects an access token.
    pub(crate) async fn send_anonymous(
        &self,
        request: reqwest::Request,
    ) -> Result<WechatResponse, WechatError> {
        self.dispatch(request, SessionToken::new()).await
    }

    async fn dispatch(
        &self,
        request: reqwest::Request,
        session: SessionToken,
    ) -> Result<WechatResponse, WechatError> {
        let service = ServiceBuilder::new()
            .layer(ResponseValidationLayer::new())
            .layer(DeveloperModeLayer::new(self.rewrites.clone()))
            .layer(TokenInjectionLayer::new(session))
            .layer(self.logging.clone())
            .service(HttpTransport::new(self.http.clone()));

        service.oneshot(request).await
    }

    pub(crate) fn decode<T: DeserializeOwned>(response: WechatResponse) -> Result<T, WechatError> {
        if !response.status().is_success() {
            return Err(WechatError::HttpStatus {
                status: response.status().as_u16(),
            });
        }
        response.json()
    }

    /// Make a GET request to WeChat API
    ///
    /// # Arguments
    /// * `path` - API endpoint path (e.g., "/cgi-bin/menu/get")
    /// * `query` - Query parameters as key-value pairs
    ///
    /// # Errors
    /// - Returns `WechatError::HttpStatus` for non-2xx HTTP status codes
    /// - Returns `WechatError::Api` when WeChat API returns errcode != 0
    /// - Returns `WechatError::Json` when the body does not match `T`
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WechatError> {
        let request = self.http.get(self.url(path)).query(query).build()?;
        Self::decode(self.send(request).await?)
    }

    /// Make a POST request to WeChat API
    ///
    /// # Arguments
    /// * `path` - API endpoint path (e.g., "/cgi-bin/shorturl")
    /// * `body` - Request body to serialize as JSON
    ///
    /// # Errors
    /// Same as [`get`](Self::get).
    pub async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, WechatError> {
        let request = self.http.post(self.url(path)).json(body).build()?;
        Self::decode(self.send(request).await?)
    }
}

/// Builder for WechatClient
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use wechat_oa_sdk::client::WechatClient;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = WechatClient::builder()
///         .timeout(Duration::from_secs(10))
///         .developer_mode(true)
///         .build()?;
///
///     assert!(client.developer_mode());
///     Ok(())
/// }
/// ```
#[derive(Debug, Default)]
pub struct WechatClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    developer_mode: bool,
    sandbox_hosts: Vec<(String, String)>,
    verbose_logging: bool,
}

impl WechatClientBuilder {
    /// Set the base URL for API calls
    ///
    /// Default: `<https://api.weixin.qq.com>`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the total timeout for requests
    ///
    /// Default: 30 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Rewrite production hosts to their sandbox equivalents.
    ///
    /// Default: off
    pub fn developer_mode(mut self, enabled: bool) -> Self {
        self.developer_mode = enabled;
        self
    }

    /// Add or override one entry of the developer-mode host table.
    pub fn sandbox_host(mut self, production: impl Into<String>, sandbox: impl Into<String>) -> Self {
        self.sandbox_hosts.push((production.into(), sandbox.into()));
        self
    }

    /// Log requests at debug level with direction markers.
    pub fn verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }

    /// Build the WechatClient
    ///
    /// # Errors
    /// Returns `WechatError::Config` if the base URL is not an absolute URL.
    pub fn build(self) -> Result<WechatClient, WechatError> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url)
            .map_err(|e| WechatError::Config(format!("invalid base_url '{base_url}': {e}")))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let timeout = self
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let connect_timeout = self
            .connect_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));

        // Redirects are surfaced to callers so the session token never
        // follows one to a foreign host.
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let rewrites = if self.developer_mode {
            HostRewrites::from_pairs(
                DEFAULT_SANDBOX_HOSTS
                    .iter()
                    .map(|(from, to)| (from.to_string(), to.to_string()))
                    .chain(self.sandbox_hosts),
            )
        } else {
            HostRewrites::none()
        };

        let logging = if self.verbose_logging {
            LoggingMiddleware::new().verbose()
        } else {
            LoggingMiddleware::new()
        };

        Ok(WechatClient {
            http: client,
            base_url,
            session: SessionToken::new(),
            developer_mode: self.developer_mode,
            rewrites,
            logging,
        })
    }
}
