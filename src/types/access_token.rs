use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// WeChat Access Token
///
/// An immutable pair of bearer value and absolute expiry. Construction does
/// not validate anything; [`is_valid`](Self::is_valid) judges usability at
/// call time.
///
/// Serialized as `{"token": "<value>", "expires": <unix seconds>}`, which is
/// the on-disk and in-cache representation used by every
/// [`TokenStore`](crate::store::TokenStore).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "token")]
    value: String,
    #[serde(rename = "expires", with = "chrono::serde::ts_seconds")]
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True iff the value is non-empty and the expiry is strictly in the future.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub(crate) fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.value.is_empty() && self.expires_at > now
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
