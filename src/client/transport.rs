//! The raw HTTP collaborator at the bottom of the request pipeline.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tower::Service;

use crate::error::WechatError;

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct WechatResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl WechatResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, WechatError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

pub(crate) type TransportFuture =
    Pin<Box<dyn Future<Output = Result<WechatResponse, WechatError>> + Send>>;

/// Sends a request with [`reqwest`] and buffers the response body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl Service<reqwest::Request> for HttpTransport {
    type Response = WechatResponse;
    type Error = WechatError;
    type Future = TransportFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: reqwest::Request) -> Self::Future {
        let client = self.http.clone();
        Box::pin(async move {
            let response = client.execute(req).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok(WechatResponse::new(status, headers, body.to_vec()))
        })
    }
}
