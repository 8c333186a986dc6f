//! WeChat Official Account SDK for Rust
//!
//! Access token lifecycle and authenticated transport for the WeChat
//! Official Account platform.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wechat_oa_sdk::{store::FileTokenStore, TokenAuthenticator, WechatClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WechatClient::builder().build()?;
//!     let authenticator = TokenAuthenticator::with_store(
//!         client.clone(),
//!         Arc::new(FileTokenStore::new("/var/cache/wechat")),
//!     );
//!
//!     // Reuses a cached token when it is still valid.
//!     authenticator.activate("wx1234567890abcdef", "your_secret").await?;
//!
//!     // Every request through `client` now carries `access_token`.
//!     let menu: serde_json::Value = client.get("/cgi-bin/menu/get", &[]).await?;
//!     println!("{menu}");
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`api`] - WeChat API modules (short links)
//! - [`client`] - HTTP client and request pipeline
//! - [`error`] - Error types
//! - [`middleware`] - Tower layers: validation, developer mode, token injection, logging
//! - [`store`] - Pluggable token persistence (file, SQLite, key-value cache)
//! - [`token`] - Token acquisition and caching
//! - [`types`] - Type definitions for WeChat API entities
//!
//! ## Error Handling
//!
//! The SDK uses the [`WechatError`] enum for error handling:
//!
//! ```rust,ignore
//! use wechat_oa_sdk::WechatError;
//!
//! match authenticator.authenticate(app_id, secret).await {
//!     Ok(token) => { /* use token */ }
//!     Err(WechatError::Api { code, message }) => {
//!         eprintln!("API error: {} - {}", code, message);
//!     }
//!     Err(WechatError::Authentication(msg)) => {
//!         eprintln!("Bad token response: {}", msg);
//!     }
//!     Err(e) => {
//!         eprintln!("Other error: {}", e);
//!     }
//! }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod middleware;
pub mod store;
pub mod token;
pub mod types;

pub use client::{WechatClient, WechatClientBuilder};
pub use error::WechatError;
pub use store::{credential_hash, TokenStore};
pub use token::TokenAuthenticator;
pub use types::AccessToken;
