//! Middleware components for the WeChat request pipeline.
//!
//! Every call made through [`WechatClient`](crate::WechatClient) runs through
//! the same tower stack, outermost first:
//!
//! - [`ResponseValidationLayer`] - Maps `errcode` bodies and non-JSON bodies to typed errors
//! - [`DeveloperModeLayer`] - Rewrites production hosts to sandbox hosts
//! - [`TokenInjectionLayer`] - Appends the session's `access_token` query parameter
//! - [`LoggingMiddleware`] - Logs request/response information with secrets redacted
//!
//! Host rewriting runs before injection, so the token always travels to the
//! final host.
//!
//! ## Usage
//!
//! ```ignore
//! use tower::ServiceBuilder;
//! use wechat_oa_sdk::middleware::*;
//!
//! let service = ServiceBuilder::new()
//!     .layer(ResponseValidationLayer::new())
//!     .layer(DeveloperModeLayer::new(HostRewrites::sandbox()))
//!     .layer(TokenInjectionLayer::new(session))
//!     .layer(LoggingMiddleware::new())
//!     .service(transport);
//! ```

pub use tower::{Layer, Service, ServiceBuilder};

mod auth;
mod developer;
mod logging;
mod validation;

pub use auth::{SessionToken, TokenInjectionLayer, TokenInjectionService};
pub use developer::{
    DeveloperModeLayer, DeveloperModeService, HostRewrites, DEFAULT_SANDBOX_HOSTS,
};
pub use logging::{LoggingMiddleware, LoggingMiddlewareService};
pub use validation::{ResponseValidationLayer, ResponseValidationService};
