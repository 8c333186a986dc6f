//! Response validation.
//!
//! Turns WeChat's in-band failures into typed errors:
//!
//! - status `< 300` with a body that is not JSON: [`WechatError::InvalidResponse`]
//! - status `< 300` with a non-zero `errcode` (integer or numeric string): [`WechatError::Api`]
//! - status `< 300` with an `errcode` of any other type: [`WechatError::InvalidResponse`]
//! - status `>= 300`: passed through unchanged
//!
//! `HEAD` responses have no body and are never inspected.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use reqwest::{Method, Request};
use tower::{Layer, Service};

use crate::client::WechatResponse;
use crate::error::WechatError;
use crate::types::ApiStatus;

#[derive(Debug, Clone, Default)]
pub struct ResponseValidationLayer;

impl ResponseValidationLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for ResponseValidationLayer {
    type Service = ResponseValidationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseValidationService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseValidationService<S> {
    inner: S,
}

impl<S> Service<Request> for ResponseValidationService<S>
where
    S: Service<Request, Response = WechatResponse, Error = WechatError>,
    S::Future: Send + 'static,
{
    type Response = WechatResponse;
    type Error = WechatError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let inspect = req.method() != Method::HEAD;
        let future = self.inner.call(req);

        Box::pin(async move {
            let response = future.await?;
            if inspect && response.status().as_u16() < 300 {
                validate(&response)?;
            }
            Ok(response)
        })
    }
}

/// Check a successful response body for WeChat's error envelope.
fn validate(response: &WechatResponse) -> Result<(), WechatError> {
    let value: serde_json::Value = serde_json::from_slice(response.body()).map_err(|e| {
        WechatError::InvalidResponse(format!("expected a JSON body: {e}"))
    })?;

    let status = ApiStatus::from_body(&value)?;
    if status.is_success() {
        Ok(())
    } else {
        Err(WechatError::Api {
            code: status.errcode,
            message: status.errmsg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use reqwest::{StatusCode, Url};
    use tower::ServiceExt;

    async fn run(method: Method, status: u16, body: &'static str) -> Result<WechatResponse, WechatError> {
        let inner = tower::service_fn(move |_req: Request| async move {
            Ok::<_, WechatError>(WechatResponse::new(
                StatusCode::from_u16(status).unwrap(),
                HeaderMap::new(),
                body.as_bytes().to_vec(),
            ))
        });
        let req = Request::new(method, Url::parse("https://api.weixin.qq.com/cgi-bin/menu/get").unwrap());
        ResponseValidationLayer::new().layer(inner).oneshot(req).await
    }

    #[tokio::test]
    async fn test_success_body_passes() {
        let response = run(Method::GET, 200, r#"{"errcode":0,"errmsg":"ok"}"#).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(run(Method::GET, 200, r#"{"access_token":"AT1","expires_in":7200}"#)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_api_error_surfaces() {
        let result = run(
            Method::GET,
            200,
            r#"{"errcode":40001,"errmsg":"invalid credential"}"#,
        )
        .await;

        match result {
            Err(WechatError::Api { code, message }) => {
                assert_eq!(code, 40001);
                assert_eq!(message, "invalid credential");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_invalid_response() {
        let result = run(Method::POST, 200, "<html>busy</html>").await;
        assert!(matches!(result, Err(WechatError::InvalidResponse(_))));

        let result = run(Method::GET, 204, "").await;
        assert!(matches!(result, Err(WechatError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_non_success_status_passes_through() {
        let response = run(Method::GET, 502, "<html>bad gateway</html>").await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = run(Method::GET, 302, "").await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_head_is_not_inspected() {
        let response = run(Method::HEAD, 200, "").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_string_errcode_surfaces() {
        let result = run(Method::GET, 200, r#"{"errcode":"40001","errmsg":1}"#).await;
        assert!(matches!(result, Err(WechatError::Api { code: 40001, .. })));

        let result = run(Method::GET, 200, r#"{"errcode":"0","errmsg":"ok"}"#).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_errcode_is_invalid_response() {
        let result = run(Method::GET, 200, r#"{"errcode":"busy"}"#).await;
        assert!(matches!(result, Err(WechatError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_non_object_json_passes() {
        assert!(run(Method::GET, 200, "[1,2,3]").await.is_ok());
    }
}
