use crate::http::{transport_error, HttpBackend};
use beacon_core::{BearerToken, BoardError, Result};
use serde_json::Value;
use tracing::{info, warn};

/// 设备名最短长度
pub const MIN_DEVICE_NAME_LEN: usize = 3;

/// 校验设备名
pub fn validate_device_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.chars().count() < MIN_DEVICE_NAME_LEN {
        return Err(BoardError::validation(format!(
            "device name must be at least {} characters",
            MIN_DEVICE_NAME_LEN
        )));
    }
    Ok(trimmed)
}

impl HttpBackend {
    /// 注册新设备
    ///
    /// 返回服务端的原始响应体
    pub async fn register_device(&self, device_name: &str, token: &BearerToken) -> Result<Value> {
        let device_name = validate_device_name(device_name)?;
        let url = self.options.url(&self.options.register_path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.as_str())
            .form(&[("device_name", device_name)])
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(BoardError::auth(format!(
                "registration of {} not authorized",
                device_name
            )));
        }
        if !status.is_success() {
            warn!(device = %device_name, status = %status, "Registration rejected");
            return Err(BoardError::submission(format!(
                "registration of {} failed with status {}",
                device_name, status
            )));
        }

        let body = response
            .json::<Value>()
            .await
            .unwrap_or(Value::Null);

        info!(device = %device_name, "Device registered");
        Ok(body)
    }
}
