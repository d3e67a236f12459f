use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 后端地址与各接口路径
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendOptions {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// 请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_signals_path")]
    pub signals_path: String,

    #[serde(default = "default_gpu_info_path")]
    pub gpu_info_path: String,

    #[serde(default = "default_return_message_path")]
    pub return_message_path: String,

    #[serde(default = "default_token_path")]
    pub token_path: String,

    #[serde(default = "default_register_path")]
    pub register_path: String,
}

// 默认值函数
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_signals_path() -> String {
    "/json/signals".to_string()
}

fn default_gpu_info_path() -> String {
    "/json/gpu_info".to_string()
}

fn default_return_message_path() -> String {
    "/api/return_message".to_string()
}

fn default_token_path() -> String {
    "/api/token".to_string()
}

fn default_register_path() -> String {
    "/api/v2/register/device".to_string()
}

impl BackendOptions {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 拼接完整地址
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            signals_path: default_signals_path(),
            gpu_info_path: default_gpu_info_path(),
            return_message_path: default_return_message_path(),
            token_path: default_token_path(),
            register_path: default_register_path(),
        }
    }
}
