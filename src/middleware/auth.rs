//! Access token injection.
//!
//! The session's current [`AccessToken`] lives in a [`SessionToken`] slot
//! owned by the client. [`TokenInjectionLayer`] reads the slot on every call
//! and appends `access_token=<value>` to the outgoing query string. An
//! empty slot leaves the request untouched, which is how anonymous calls
//! (token issuance, following short-link redirects) avoid leaking the token.
//!
//! # Example
//!
//! ```ignore
//! use tower::ServiceBuilder;
//! use wechat_oa_sdk::middleware::{SessionToken, TokenInjectionLayer};
//!
//! let session = SessionToken::new();
//! let service = ServiceBuilder::new()
//!     .layer(TokenInjectionLayer::new(session.clone()))
//!     .service(transport);
//! ```

use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Request, Url};
use tower::{Layer, Service};

use crate::types::AccessToken;

/// Characters that must be encoded in query parameter values.
/// Includes: space, &, =, %, +, #, and control characters.
const QUERY_VALUE_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'&')
    .add(b'=')
    .add(b'%')
    .add(b'+')
    .add(b'#');

/// Shared, lockable slot for the session's current access token.
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct SessionToken {
    inner: Arc<RwLock<Option<AccessToken>>>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token, if any.
    pub fn get(&self) -> Option<AccessToken> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the current token, returning the previous one.
    ///
    /// A token with an empty value clears the slot.
    pub fn set(&self, token: Option<AccessToken>) -> Option<AccessToken> {
        let token = token.filter(|t| !t.as_str().is_empty());
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, token)
    }
}

/// Layer that injects the session token into requests.
#[derive(Debug, Clone)]
pub struct TokenInjectionLayer {
    session: SessionToken,
}

impl TokenInjectionLayer {
    pub fn new(session: SessionToken) -> Self {
        Self { session }
    }
}

impl<S> Layer<S> for TokenInjectionLayer {
    type Service = TokenInjectionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenInjectionService {
            inner,
            session: self.session.clone(),
        }
    }
}

/// Service created by [`TokenInjectionLayer`].
#[derive(Debug, Clone)]
pub struct TokenInjectionService<S> {
    inner: S,
    session: SessionToken,
}

impl<S> Service<Request> for TokenInjectionService<S>
where
    S: Service<Request>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        if let Some(token) = self.session.get() {
            add_access_token_query(req.url_mut(), token.as_str());
        }
        self.inner.call(req)
    }
}

/// Append `access_token=<token>` as the last query pair of `url`.
fn add_access_token_query(url: &mut Url, token: &str) {
    let encoded = utf8_percent_encode(token, QUERY_VALUE_ENCODE_SET);
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&access_token={encoded}"),
        _ => format!("access_token={encoded}"),
    };
    url.set_query(Some(&query));
}
