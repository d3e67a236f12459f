use crate::error::Result;
use crate::model::{GpuInfo, SignalsPayload};
use async_trait::async_trait;
use std::fmt;

/// 外部提供的 Bearer 令牌
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Authorization` 头的值
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

// 令牌不进日志
impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// 看板后端
///
/// 存储和编辑器只通过该 trait 访问后端，HTTP 传输由实现方负责。
#[async_trait]
pub trait SignalBackend: Send + Sync {
    /// 拉取设备心跳列表
    async fn fetch_signals(&self) -> Result<SignalsPayload>;

    /// 拉取 GPU 状态
    async fn fetch_gpu_info(&self) -> Result<GpuInfo>;

    /// 提交设备的返回消息
    async fn submit_return_message(
        &self,
        device_name: &str,
        return_message: &str,
        token: &BearerToken,
    ) -> Result<()>;

    /// 后端名称（用于日志）
    fn name(&self) -> &str {
        "backend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_header_and_debug() {
        let token = BearerToken::new("abc.def");
        assert_eq!(token.header_value(), "Bearer abc.def");
        assert_eq!(token.as_str(), "abc.def");
        assert_eq!(format!("{:?}", token), "BearerToken(***)");
    }
}
