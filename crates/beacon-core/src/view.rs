use crate::history::HISTORY_LEN;
use crate::store::StoreOptions;
use std::time::Duration;

/// 默认时钟滴答间隔
pub const DEFAULT_CLOCK_TICK: Duration = Duration::from_millis(1000);

/// 心跳看板默认刷新间隔
pub const HEARTBEAT_REFRESH: Duration = Duration::from_secs(60);

/// 报告页默认刷新间隔
pub const REPORTS_REFRESH: Duration = Duration::from_secs(300);

/// 视图的轮询配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewProfile {
    /// 视图名称（用于日志）
    pub name: String,

    /// 本地时钟滴答间隔，为空时不重算经过秒数
    pub clock_tick: Option<Duration>,

    /// 网络刷新间隔，为空时只在启动时拉取一次
    pub network_refresh: Option<Duration>,

    /// 滚动历史容量，为空时不记录
    pub history_capacity: Option<usize>,

    /// 是否同时拉取 GPU 状态
    pub fetch_gpu_info: bool,

    /// 历史是否以零值占位填满
    pub prefill_history: bool,
}

impl ViewProfile {
    /// 心跳看板：每秒重算、每分钟刷新、记录在线数历史
    pub fn heartbeat_board() -> Self {
        Self {
            name: "heartbeat".to_string(),
            clock_tick: Some(DEFAULT_CLOCK_TICK),
            network_refresh: Some(HEARTBEAT_REFRESH),
            history_capacity: Some(HISTORY_LEN),
            fetch_gpu_info: false,
            prefill_history: false,
        }
    }

    /// 报告页：每五分钟刷新
    pub fn reports() -> Self {
        Self {
            name: "reports".to_string(),
            clock_tick: None,
            network_refresh: Some(REPORTS_REFRESH),
            history_capacity: None,
            fetch_gpu_info: false,
            prefill_history: false,
        }
    }

    /// 返回消息编辑页：只在进入时拉取一次
    pub fn return_message() -> Self {
        Self {
            name: "return-message".to_string(),
            clock_tick: None,
            network_refresh: None,
            history_capacity: None,
            fetch_gpu_info: false,
            prefill_history: false,
        }
    }

    pub fn with_gpu_info(mut self, enabled: bool) -> Self {
        self.fetch_gpu_info = enabled;
        self
    }

    pub fn with_clock_tick(mut self, tick: Option<Duration>) -> Self {
        self.clock_tick = tick;
        self
    }

    pub fn with_network_refresh(mut self, refresh: Option<Duration>) -> Self {
        self.network_refresh = refresh;
        self
    }

    pub fn with_history_capacity(mut self, capacity: Option<usize>) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_prefilled_history(mut self, enabled: bool) -> Self {
        self.prefill_history = enabled;
        self
    }

    /// 该视图对应的存储选项
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            fetch_gpu_info: self.fetch_gpu_info,
            history_capacity: self.history_capacity,
            prefill_history: self.prefill_history,
        }
    }
}
