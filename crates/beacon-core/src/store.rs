use crate::backend::SignalBackend;
use crate::error::{BoardError, Result};
use crate::history::RollingHistory;
use crate::model::{
    count_online, parse_devices, AggregatePoint, DeviceRecord, GpuInfo, RecordError,
    SignalsPayload,
};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// 存储选项
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// 刷新时同时拉取 GPU 状态
    pub fetch_gpu_info: bool,

    /// 滚动历史容量，为空时不记录历史
    pub history_capacity: Option<usize>,

    /// 历史初始用零点填满
    pub prefill_history: bool,
}

/// 零点填充时使用的标签
pub const PREFILL_LABEL: &str = "-";

/// 存储变更通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// 一次刷新结果已整体替换
    Refreshed {
        device_count: usize,
        online_count: u64,
    },
    /// 经过秒数已重新计算
    Ticked { device_count: usize },
    /// 刷新失败，保留旧数据
    Failed { error: String },
    /// 本地返回消息已乐观更新
    ReturnMessageUpdated { device_name: String },
}

/// 一次成功刷新的结果
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub device_count: usize,
    pub online_count: u64,
    /// 被隔离的单条解析失败
    pub record_errors: Vec<RecordError>,
    /// GPU 状态拉取失败原因
    pub gpu_error: Option<String>,
}

/// 刷新结果
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// 已写入存储
    Applied(RefreshReport),
    /// 发起请求后视图已销毁，结果被丢弃
    Discarded { generation: u64 },
}

impl RefreshOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RefreshOutcome::Applied(_))
    }
}

/// 存储的只读快照
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub records: Arc<Vec<DeviceRecord>>,
    pub gpu_info: Option<GpuInfo>,
    pub heartbeat_log: Vec<AggregatePoint>,
    pub history: Vec<AggregatePoint>,
    pub loading: bool,
    pub errored: bool,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn online_count(&self) -> u64 {
        count_online(&self.records)
    }
}

struct StoreState {
    records: Arc<Vec<DeviceRecord>>,
    gpu_info: Option<GpuInfo>,
    heartbeat_log: Vec<AggregatePoint>,
    history: Option<RollingHistory>,
    errored: bool,
    last_error: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    /// 正在编辑返回消息的设备，刷新时保留其本地值
    pinned: Option<String>,
}

/// 设备心跳快照存储
///
/// 记录集合以 `Arc<Vec<_>>` 整体替换；读者拿到的快照不会看到替换到一半的数据。
/// 并发刷新按完成顺序生效（后完成者覆盖先完成者）。
pub struct SnapshotStore {
    backend: Arc<dyn SignalBackend>,
    options: StoreOptions,
    state: RwLock<StoreState>,
    generation: AtomicU64,
    in_flight: Arc<AtomicUsize>,
    events: broadcast::Sender<StoreEvent>,
}

/// 一次刷新请求
///
/// 创建时记录代数并计入在途请求，丢弃时计数递减（包括失败、被丢弃和任务未运行）。
#[derive(Debug)]
pub struct RefreshTicket {
    generation: u64,
    in_flight: Arc<AtomicUsize>,
}

impl RefreshTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SnapshotStore {
    pub fn new(backend: Arc<dyn SignalBackend>, options: StoreOptions) -> Self {
        let history = options.history_capacity.map(|capacity| {
            if options.prefill_history {
                RollingHistory::filled(capacity, AggregatePoint::new(PREFILL_LABEL, 0))
            } else {
                RollingHistory::new(capacity)
            }
        });
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            backend,
            options,
            state: RwLock::new(StoreState {
                records: Arc::new(Vec::new()),
                gpu_info: None,
                heartbeat_log: Vec::new(),
                history,
                errored: false,
                last_error: None,
                updated_at: None,
                pinned: None,
            }),
            generation: AtomicU64::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            events,
        }
    }

    /// 从后端拉取最新数据并整体替换记录集合
    ///
    /// # 错误
    /// * `Network` / `Parse` - 拉取失败，旧数据保留，存储标记为出错
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        self.refresh_with(self.begin_refresh()).await
    }

    /// 以当前代数登记一次刷新请求
    pub fn begin_refresh(&self) -> RefreshTicket {
        self.begin_refresh_at(self.generation())
    }

    /// 以给定代数登记一次刷新请求
    ///
    /// 轮询器用启动时的代数登记，停止后发起的请求一律作废。
    pub fn begin_refresh_at(&self, generation: u64) -> RefreshTicket {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        RefreshTicket {
            generation,
            in_flight: self.in_flight.clone(),
        }
    }

    /// 执行已登记的刷新请求
    ///
    /// 代数在请求登记时确定；执行前已过期的请求不再访问后端。
    pub async fn refresh_with(&self, ticket: RefreshTicket) -> Result<RefreshOutcome> {
        let generation = ticket.generation();
        if generation != self.generation() {
            debug!(generation, "Skipping refresh requested before teardown");
            return Ok(RefreshOutcome::Discarded { generation });
        }

        debug!(backend = self.backend.name(), generation, "Refreshing signals");

        let (signals, gpu) = if self.options.fetch_gpu_info {
            let (signals, gpu) = tokio::join!(
                self.backend.fetch_signals(),
                self.backend.fetch_gpu_info()
            );
            (signals, Some(gpu))
        } else {
            (self.backend.fetch_signals().await, None)
        };

        let outcome = self.complete(generation, signals, gpu);
        drop(ticket);
        outcome
    }

    fn complete(
        &self,
        generation: u64,
        signals: Result<SignalsPayload>,
        gpu: Option<Result<GpuInfo>>,
    ) -> Result<RefreshOutcome> {
        let mut state = self.state.write()?;

        // 在写锁内比较代数，保证 invalidate 之后不会再有写入
        let current = self.generation.load(Ordering::SeqCst);
        if generation != current {
            debug!(generation, current, "Discarding refresh result for torn-down view");
            return Ok(RefreshOutcome::Discarded { generation });
        }

        let payload = match signals {
            Ok(payload) => payload,
            Err(e) => {
                state.errored = true;
                state.last_error = Some(e.to_string());
                drop(state);

                warn!(error = %e, "Signal refresh failed, keeping last known records");
                self.emit(StoreEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let now = Utc::now();
        let (mut records, record_errors) = parse_devices(payload.devices, now);

        if let Some(pinned) = state.pinned.as_deref() {
            let kept = state
                .records
                .iter()
                .find(|record| record.device_name == pinned)
                .map(|record| record.return_message.clone());
            if let (Some(kept), Some(record)) = (
                kept,
                records.iter_mut().find(|record| record.device_name == pinned),
            ) {
                record.return_message = kept;
            }
        }

        let gpu_error = match gpu {
            Some(Ok(info)) => {
                state.gpu_info = Some(info);
                None
            }
            Some(Err(e)) => {
                warn!(error = %e, "GPU info refresh failed, keeping last known status");
                Some(e.to_string())
            }
            None => None,
        };

        let online_count = count_online(&records);
        let device_count = records.len();

        state.records = Arc::new(records);
        state.heartbeat_log = payload
            .heartbeat_log
            .unwrap_or_default()
            .into_iter()
            .map(AggregatePoint::from)
            .collect();
        if let Some(history) = state.history.as_mut() {
            history.push(AggregatePoint::at(now, online_count));
        }
        state.updated_at = Some(now);

        let problems: Vec<String> = record_errors
            .iter()
            .map(ToString::to_string)
            .chain(gpu_error.iter().map(|e| format!("gpu info: {}", e)))
            .collect();
        state.errored = !problems.is_empty();
        state.last_error = if problems.is_empty() {
            None
        } else {
            Some(problems.join("; "))
        };
        drop(state);

        for error in &record_errors {
            warn!(error = %error, "Skipped unparseable device field");
        }
        info!(device_count, online_count, "Signals refreshed");
        self.emit(StoreEvent::Refreshed {
            device_count,
            online_count,
        });

        Ok(RefreshOutcome::Applied(RefreshReport {
            device_count,
            online_count,
            record_errors,
            gpu_error,
        }))
    }

    /// 用 `now` 重新计算所有记录的经过秒数，不访问网络
    pub fn tick(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut state = self.state.write()?;
        let records = Arc::make_mut(&mut state.records);
        for record in records.iter_mut() {
            record.recompute_elapsed(now);
        }
        let device_count = records.len();
        drop(state);

        self.emit(StoreEvent::Ticked { device_count });
        Ok(device_count)
    }

    /// 视图销毁：此前发起的请求结果一律丢弃
    pub fn invalidate(&self) -> u64 {
        let _state = self.state.write();
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation = next, "Store generation advanced");
        next
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// 标记正在编辑返回消息的设备（`None` 取消）
    ///
    /// 锁中毒时仍然写入，保证与编辑状态一致。
    pub fn pin_return_message(&self, device_name: Option<String>) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.pinned = device_name;
    }

    /// 乐观更新本地返回消息
    ///
    /// 返回设备是否仍在当前集合中。
    pub fn apply_return_message(&self, device_name: &str, message: &str) -> Result<bool> {
        let mut state = self.state.write()?;
        let records = Arc::make_mut(&mut state.records);
        let Some(record) = records
            .iter_mut()
            .find(|record| record.device_name == device_name)
        else {
            return Ok(false);
        };
        record.return_message = Some(message.to_string());
        drop(state);

        self.emit(StoreEvent::ReturnMessageUpdated {
            device_name: device_name.to_string(),
        });
        Ok(true)
    }

    /// 当前记录集合（共享引用，不会被后续替换修改）
    pub fn records(&self) -> Result<Arc<Vec<DeviceRecord>>> {
        Ok(self.state.read()?.records.clone())
    }

    /// 按位置读取记录
    pub fn record(&self, index: usize) -> Result<DeviceRecord> {
        let state = self.state.read()?;
        state
            .records
            .get(index)
            .cloned()
            .ok_or_else(|| BoardError::NotFound(format!("device index {}", index)))
    }

    pub fn history(&self) -> Result<Vec<AggregatePoint>> {
        let state = self.state.read()?;
        Ok(state
            .history
            .as_ref()
            .map(RollingHistory::snapshot)
            .unwrap_or_default())
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        let state = self.state.read()?;
        Ok(Snapshot {
            records: state.records.clone(),
            gpu_info: state.gpu_info.clone(),
            heartbeat_log: state.heartbeat_log.clone(),
            history: state
                .history
                .as_ref()
                .map(RollingHistory::snapshot)
                .unwrap_or_default(),
            loading: self.in_flight.load(Ordering::SeqCst) > 0,
            errored: state.errored,
            last_error: state.last_error.clone(),
            updated_at: state.updated_at,
        })
    }

    /// 订阅变更通知
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // 没有订阅者时发送失败，忽略即可
        let _ = self.events.send(event);
    }
}
