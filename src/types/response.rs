use serde::Deserialize;
use serde_json::Value;

use crate::error::WechatError;

/// The `{errcode, errmsg}` envelope WeChat attaches to API responses.
///
/// Successful responses usually omit both fields, so both default.
#[derive(Debug, Default, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

impl ApiStatus {
    /// Read the envelope from a decoded response body.
    ///
    /// Non-object bodies carry no envelope and count as success. `errcode`
    /// may be an integer or a numeric string; anything else is an
    /// [`WechatError::InvalidResponse`].
    pub fn from_body(body: &Value) -> Result<Self, WechatError> {
        let Some(object) = body.as_object() else {
            return Ok(Self::default());
        };

        let errcode = match object.get("errcode") {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                WechatError::InvalidResponse(format!("errcode is not an integer: {n}"))
            })?,
            Some(Value::String(s)) => s.trim().parse().map_err(|_| {
                WechatError::InvalidResponse(format!("errcode is not numeric: {s:?}"))
            })?,
            Some(other) => {
                return Err(WechatError::InvalidResponse(format!(
                    "unexpected errcode: {other}"
                )))
            }
        };

        let errmsg = match object.get("errmsg") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        Ok(Self { errcode, errmsg })
    }

    pub fn is_success(&self) -> bool {
        self.errcode == 0
    }
}
