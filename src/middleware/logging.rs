use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use log::{debug, info};
use reqwest::Request;
use tower::{Layer, Service};

use crate::client::WechatResponse;

#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    verbose: bool,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for LoggingMiddleware {
    type Service = LoggingMiddlewareService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingMiddlewareService {
            inner,
            verbose: self.verbose,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingMiddlewareService<S> {
    inner: S,
    verbose: bool,
}

const SENSITIVE_FIELDS: &[&str] = &[
    "access_token",
    "appsecret",
    "secret",
    "password",
    "token",
    "authorization",
];

fn redact_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let redacted_query = query
        .split('&')
        .map(|param| match param.split_once('=') {
            Some((key, _)) if SENSITIVE_FIELDS.iter().any(|s| key.eq_ignore_ascii_case(s)) => {
                format!("{key}=[REDACTED]")
            }
            _ => param.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{redacted_query}")
}

fn log_request(method: &str, url: &str, verbose: bool) {
    let safe_url = redact_url(url);
    if verbose {
        debug!("[Wechat] >>> {} {}", method, safe_url);
    } else {
        info!("[Wechat] {} {}", method, safe_url);
    }
}

fn log_response(status: u16, duration: std::time::Duration, verbose: bool) {
    if verbose {
        debug!("[Wechat] <<< {} ({:?})", status, duration);
    } else {
        info!("[Wechat] {} ({:?})", status, duration);
    }
}

impl<S, Error> Service<Request> for LoggingMiddlewareService<S>
where
    S: Service<Request, Response = WechatResponse, Error = Error>,
    S::Future: Send + 'static,
    Error: std::fmt::Display + Send + 'static,
{
    type Response = WechatResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let verbose = self.verbose;
        log_request(req.method().as_str(), req.url().as_str(), verbose);

        let start = Instant::now();
        let future = self.inner.call(req);

        Box::pin(async move {
            match future.await {
                Ok(response) => {
                    log_response(response.status().as_u16(), start.elapsed(), verbose);
                    Ok(response)
                }
                Err(e) => {
                    info!("[Wechat] request failed after {:?}: {}", start.elapsed(), e);
                    Err(e)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WechatError;
    use reqwest::header::HeaderMap;
    use reqwest::{Method, StatusCode, Url};
    use tower::ServiceExt;

    #[test]
    fn test_redact_url_no_sensitive_params() {
        let url = "https://api.weixin.qq.com/cgi-bin/token?grant_type=client_credential";
        assert_eq!(redact_url(url), url);
    }

    #[test]
    fn test_redact_url_with_access_token() {
        let url = "https://api.weixin.qq.com/cgi-bin/menu/get?lang=en&access_token=abc123";
        let redacted = redact_url(url);
        assert!(redacted.contains("access_token=[REDACTED]"));
        assert!(redacted.contains("lang=en"));
        assert!(!redacted.contains("abc123"));
    }

    #[test]
    fn test_redact_url_with_secret() {
        let url = "https://api.weixin.qq.com/cgi-bin/token?grant_type=client_credential&appid=wx1&secret=mysecret";
        let redacted = redact_url(url);
        assert!(redacted.contains("secret=[REDACTED]"));
        assert!(redacted.contains("appid=wx1"));
        assert!(!redacted.contains("mysecret"));
    }

    #[test]
    fn test_redact_url_without_query() {
        let url = "https://api.weixin.qq.com/cgi-bin/menu/get";
        assert_eq!(redact_url(url), url);
    }

    #[tokio::test]
    async fn test_logging_passes_response_through() {
        let inner = tower::service_fn(|_req: Request| async {
            Ok::<_, WechatError>(WechatResponse::new(StatusCode::OK, HeaderMap::new(), b"{}".to_vec()))
        });
        let req = Request::new(
            Method::GET,
            Url::parse("https://api.weixin.qq.com/cgi-bin/menu/get?access_token=secret123").unwrap(),
        );

        let response = LoggingMiddleware::new().verbose().layer(inner).oneshot(req).await.unwrap();
        assert_eq!(response.body(), b"{}");
    }

    #[tokio::test]
    async fn test_logging_passes_error_through() {
        let inner = tower::service_fn(|_req: Request| async {
            Err::<WechatResponse, _>(WechatError::HttpStatus { status: 500 })
        });
        let req = Request::new(Method::GET, Url::parse("https://api.weixin.qq.com/").unwrap());

        let result = LoggingMiddleware::new().layer(inner).oneshot(req).await;
        assert!(matches!(result, Err(WechatError::HttpStatus { status: 500 })));
    }
}
