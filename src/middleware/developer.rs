//! Developer mode: redirect production WeChat hosts to sandbox hosts.

use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};

use reqwest::Request;
use tower::{Layer, Service};

/// Production host to sandbox host mapping used when developer mode is on.
pub const DEFAULT_SANDBOX_HOSTS: &[(&str, &str)] = &[
    ("api.weixin.qq.com", "api.wechat.com"),
    ("file.api.weixin.qq.com", "file.api.wechat.com"),
    ("mp.weixin.qq.com", "mp.wechat.com"),
];

/// Immutable host rewrite table.
#[derive(Debug, Clone, Default)]
pub struct HostRewrites {
    hosts: Arc<HashMap<String, String>>,
}

impl HostRewrites {
    /// An empty table; requests pass through unchanged.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn sandbox() -> Self {
        Self::from_pairs(
            DEFAULT_SANDBOX_HOSTS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string())),
        )
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            hosts: Arc::new(pairs.into_iter().collect()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn target(&self, host: &str) -> Option<&str> {
        self.hosts.get(host).map(String::as_str)
    }
}

/// Layer that rewrites request hosts according to a [`HostRewrites`] table.
#[derive(Debug, Clone)]
pub struct DeveloperModeLayer {
    rewrites: HostRewrites,
}

impl DeveloperModeLayer {
    pub fn new(rewrites: HostRewrites) -> Self {
        Self { rewrites }
    }
}

impl<S> Layer<S> for DeveloperModeLayer {
    type Service = DeveloperModeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DeveloperModeService {
            inner,
            rewrites: self.rewrites.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeveloperModeService<S> {
    inner: S,
    rewrites: HostRewrites,
}

impl<S> Service<Request> for DeveloperModeService<S>
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
        let target = req
            .url()
            .host_str()
            .and_then(|host| self.rewrites.target(host))
            .map(str::to_string);

        if let Some(target) = target {
            let url = req.url_mut();
            if let Err(e) = url.set_host(Some(&target)) {
                log::warn!("Sandbox host '{}' rejected: {}", target, e);
            }
        }

        self.inner.call(req)
    }
}
