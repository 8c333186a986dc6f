//! WeChat HTTP Client module
//!
//! This module contains the WechatClient, its builder and the raw transport.

mod transport;
pub use transport::{HttpTransport, WechatResponse};

mod wechat_client;
pub use wechat_client::{WechatClient, WechatClientBuilder};
