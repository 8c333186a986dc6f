//! WeChat Official Account API modules
//!
//! - [`shorturl`] - Short link creation and resolution
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wechat_oa_sdk::api::ShortUrlApi;
//!
//! let short = ShortUrlApi::new(client.clone()).shorten("https://example.com/long").await?;
//! ```

pub mod shorturl;
pub mod r#trait;

pub use r#trait::WechatApi;
pub use shorturl::{ShortUrlApi, ShortUrlResponse};
