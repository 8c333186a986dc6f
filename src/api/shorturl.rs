use reqwest::header::LOCATION;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::api::r#trait::WechatApi;
use crate::client::WechatClient;
use crate::error::WechatError;

/// Maximum number of redirects followed by [`ShortUrlApi::expand`].
pub const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Serialize)]
struct ShortUrlRequest<'a> {
    action: &'static str,
    long_url: &'a str,
}

#[non_exhaustive]
#[derive(Debug, Clone, Deserialize)]
pub struct ShortUrlResponse {
    pub short_url: String,
}

/// WeChat short URL API
///
/// Converts long URLs into `w.url.cn` short links and resolves them back.
pub struct ShortUrlApi {
    client: WechatClient,
}

impl ShortUrlApi {
    pub fn new(client: WechatClient) -> Self {
        Self { client }
    }

    /// Shorten a URL.
    ///
    /// POST /cgi-bin/shorturl
    pub async fn shorten(&self, long_url: &str) -> Result<String, WechatError> {
        let request = ShortUrlRequest {
            action: "long2short",
            long_url,
        };
        let response: ShortUrlResponse = self.client.post("/cgi-bin/shorturl", &request).await?;
        Ok(response.short_url)
    }

    /// Resolve a short URL by following its redirect chain with `HEAD`
    /// requests.
    ///
    /// The hops may lead to arbitrary third-party hosts, so none of them
    /// carries the session token. The session itself is left untouched.
    pub async fn expand(&self, short_url: &str) -> Result<String, WechatError> {
        self.follow_redirects(short_url).await
    }

    async fn follow_redirects(&self, short_url: &str) -> Result<String, WechatError> {
        let mut url = Url::parse(short_url)
            .map_err(|e| WechatError::Config(format!("invalid short url '{short_url}': {e}")))?;

        for _ in 0..=MAX_REDIRECTS {
            let request = self.client.http().head(url.clone()).build()?;
            let response = self.client.send_anonymous(request).await?;

            if !response.status().is_redirection() {
                if !response.status().is_success() {
                    return Err(WechatError::HttpStatus {
                        status: response.status().as_u16(),
                    });
                }
                return Ok(url.to_string());
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    WechatError::InvalidResponse(format!(
                        "redirect from '{url}' without a Location header"
                    ))
                })?;
            url = url.join(location).map_err(|e| {
                WechatError::InvalidResponse(format!("invalid redirect target '{location}': {e}"))
            })?;
        }

        Err(WechatError::InvalidResponse(format!(
            "too many redirects resolving '{short_url}'"
        )))
    }
}

impl WechatApi for ShortUrlApi {
    fn client(&self) -> &WechatClient {
        &self.client
    }

    fn api_name(&self) -> &'static str {
        "shorturl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = ShortUrlRequest {
            action: "long2short",
            long_url: "https://example.com/a?b=c",
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"action": "long2short", "long_url": "https://example.com/a?b=c"})
        );
    }

    #[test]
    fn test_api_name() {
        let api = ShortUrlApi::new(WechatClient::builder().build().unwrap());
        assert_eq!(api.api_name(), "shorturl");
    }

    #[tokio::test]
    async fn test_expand_rejects_invalid_url() {
        let api = ShortUrlApi::new(WechatClient::builder().build().unwrap());
        let result = api.expand("not a url").await;
        assert!(matches!(result, Err(WechatError::Config(_))));
    }
}
