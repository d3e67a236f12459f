use anyhow::{anyhow, Result};
use beacon_client::BackendOptions;
use beacon_core::{ViewProfile, HISTORY_LEN};
use beacon_logging::LoggingOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 看板全局配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub backend: BackendOptions,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub logging: LoggingOptions,
}

/// 轮询配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollingConfig {
    /// 时钟滴答间隔（毫秒）
    #[serde(default = "default_clock_tick_ms")]
    pub clock_tick_ms: u64,

    /// 心跳视图网络刷新间隔（毫秒）
    #[serde(default = "default_heartbeat_refresh_ms")]
    pub heartbeat_refresh_ms: u64,

    /// 报告视图网络刷新间隔（毫秒）
    #[serde(default = "default_report_refresh_ms")]
    pub report_refresh_ms: u64,

    /// 活跃度历史长度
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default)]
    pub fetch_gpu_info: bool,

    /// 活跃度历史启动时以零值填满
    #[serde(default = "default_prefill_history")]
    pub prefill_history: bool,
}

fn default_clock_tick_ms() -> u64 {
    1_000
}

fn default_heartbeat_refresh_ms() -> u64 {
    60_000
}

fn default_report_refresh_ms() -> u64 {
    300_000
}

fn default_history_capacity() -> usize {
    HISTORY_LEN
}

fn default_prefill_history() -> bool {
    true
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            clock_tick_ms: default_clock_tick_ms(),
            heartbeat_refresh_ms: default_heartbeat_refresh_ms(),
            report_refresh_ms: default_report_refresh_ms(),
            history_capacity: default_history_capacity(),
            fetch_gpu_info: false,
            prefill_history: default_prefill_history(),
        }
    }
}

impl PollingConfig {
    pub fn clock_tick(&self) -> Duration {
        Duration::from_millis(self.clock_tick_ms)
    }

    pub fn heartbeat_refresh(&self) -> Duration {
        Duration::from_millis(self.heartbeat_refresh_ms)
    }

    pub fn report_refresh(&self) -> Duration {
        Duration::from_millis(self.report_refresh_ms)
    }
}

impl BoardConfig {
    /// 心跳视图：时钟滴答 + 网络刷新 + 活跃度历史
    pub fn heartbeat_profile(&self) -> ViewProfile {
        ViewProfile::heartbeat_board()
            .with_clock_tick(Some(self.polling.clock_tick()))
            .with_network_refresh(Some(self.polling.heartbeat_refresh()))
            .with_history_capacity(Some(self.polling.history_capacity))
            .with_prefilled_history(self.polling.prefill_history)
            .with_gpu_info(self.polling.fetch_gpu_info)
    }

    /// 报告视图：只有网络刷新
    pub fn reports_profile(&self) -> ViewProfile {
        ViewProfile::reports()
            .with_network_refresh(Some(self.polling.report_refresh()))
            .with_gpu_info(self.polling.fetch_gpu_info)
    }

    /// 返回消息视图：只拉取一次
    pub fn return_message_profile(&self) -> ViewProfile {
        ViewProfile::return_message()
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        let polling = &self.polling;

        if polling.clock_tick_ms == 0 {
            return Err(anyhow!("clock_tick_ms must be greater than 0"));
        }
        if polling.heartbeat_refresh_ms == 0 || polling.report_refresh_ms == 0 {
            return Err(anyhow!("refresh intervals must be greater than 0"));
        }
        if polling.clock_tick_ms >= polling.heartbeat_refresh_ms {
            return Err(anyhow!(
                "clock_tick_ms ({}) must be less than heartbeat_refresh_ms ({})",
                polling.clock_tick_ms,
                polling.heartbeat_refresh_ms
            ));
        }
        if polling.history_capacity == 0 {
            return Err(anyhow!("history_capacity must be greater than 0"));
        }
        if self.backend.timeout_secs == 0 {
            return Err(anyhow!("backend timeout_secs must be greater than 0"));
        }
        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(anyhow!(
                "backend base_url must be an http(s) URL: {}",
                self.backend.base_url
            ));
        }

        Ok(())
    }

    /// 序列化为 TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
