use thiserror::Error;

/// WeChat SDK error types
#[derive(Debug, Error)]
pub enum WechatError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status}")]
    HttpStatus { status: u16 },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WeChat API error (code={code}): {message}")]
    Api { code: i64, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WechatError {
    /// Numeric WeChat error code, if this is an API error.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            WechatError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_code() {
        let err = WechatError::Api {
            code: 40001,
            message: "invalid credential".to_string(),
        };
        assert_eq!(err.api_code(), Some(40001));
        assert_eq!(WechatError::Config("x".to_string()).api_code(), None);
    }

    #[test]
    fn test_display() {
        let err = WechatError::Api {
            code: 40013,
            message: "invalid appid".to_string(),
        };
        assert_eq!(err.to_string(), "WeChat API error (code=40013): invalid appid");

        let err = WechatError::HttpStatus { status: 502 };
        assert_eq!(err.to_string(), "HTTP status error: 502");
    }
}
