//! WeChat API trait
//!
//! Provides the base trait for all WeChat API implementations.

use crate::client::WechatClient;

/// Trait for WeChat API implementations.
///
/// API modules hold a [`WechatClient`]; authenticated calls pick up the
/// client's session token through the request pipeline.
pub trait WechatApi: Send + Sync {
    /// Get a reference to the client this API issues requests through.
    fn client(&self) -> &WechatClient;

    /// Get the name of this API for logging and error context.
    fn api_name(&self) -> &'static str {
        "unknown"
    }
}
