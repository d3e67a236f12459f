use thiserror::Error;

/// 看板核心错误类型
#[derive(Error, Debug)]
pub enum BoardError {
    /// 网络请求失败或超时
    #[error("Network error: {0}")]
    Network(String),

    /// 时间戳或负载格式无法识别
    #[error("Parse error: {0}")]
    Parse(String),

    /// 返回消息提交失败
    #[error("Submission error: {0}")]
    Submission(String),

    /// 认证失败
    #[error("Authentication error: {0}")]
    Auth(String),

    /// 输入验证失败
    #[error("Validation error: {0}")]
    Validation(String),

    /// 设备未找到
    #[error("Device not found: {0}")]
    NotFound(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 看板结果类型
pub type Result<T> = std::result::Result<T, BoardError>;

impl BoardError {
    pub fn network(msg: impl Into<String>) -> Self {
        BoardError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        BoardError::Parse(msg.into())
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        BoardError::Submission(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        BoardError::Auth(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        BoardError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        BoardError::Internal(msg.into())
    }

    /// 是否属于可在下一轮轮询中自动恢复的错误
    pub fn is_transient(&self) -> bool {
        matches!(self, BoardError::Network(_) | BoardError::Parse(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for BoardError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        BoardError::Internal(format!("store lock poisoned: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BoardError::network("connection refused");
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = BoardError::NotFound("sensor-01".to_string());
        assert_eq!(err.to_string(), "Device not found: sensor-01");
    }

    #[test]
    fn test_transient_classification() {
        assert!(BoardError::network("timeout").is_transient());
        assert!(BoardError::parse("bad timestamp").is_transient());
        assert!(!BoardError::submission("500").is_transient());
        assert!(!BoardError::validation("too short").is_transient());
    }
}
