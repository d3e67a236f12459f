use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("Failed to install subscriber: {0}")]
    InitError(String),
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 终端可读格式
    #[default]
    Pretty,
    /// 每行一个 JSON 对象
    Json,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingOptions {
    #[serde(default = "default_level")]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    /// 额外的过滤指令，例如 `beacon_core=debug`
    #[serde(default)]
    pub directives: Vec<String>,
}

fn default_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            directives: Vec::new(),
        }
    }
}

impl LoggingOptions {
    /// 合成 EnvFilter 指令串
    pub fn filter_directive(&self) -> String {
        let mut parts = vec![self.level.as_str().to_string()];
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }
}

/// 根据配置构建过滤器，设置了 `RUST_LOG` 时以环境变量为准
pub fn build_filter(options: &LoggingOptions) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directive = options.filter_directive();
    EnvFilter::try_new(&directive).map_err(|e| LoggingError::InvalidFilter {
        directive,
        reason: e.to_string(),
    })
}

/// 安装全局 tracing 订阅者
///
/// 进程内只能成功调用一次，重复调用返回 `InitError`。
pub fn init_logging(options: &LoggingOptions) -> Result<(), LoggingError> {
    let filter = build_filter(options)?;

    let result = match options.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .try_init(),
    };

    result.map_err(|e| LoggingError::InitError(e.to_string()))?;

    tracing::debug!(
        level = options.level.as_str(),
        format = ?options.format,
        "Logging initialized"
    );
    Ok(())
}
