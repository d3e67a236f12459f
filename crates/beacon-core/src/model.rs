use crate::time::{elapsed_seconds, to_instant, ONLINE_THRESHOLD_SECS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 后端返回的原始时间戳
///
/// 按顺序尝试：整数毫秒、小数毫秒、文本，其余编码保留原值以便报错。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    EpochMillis(i64),
    EpochMillisFloat(f64),
    Text(String),
    Unrecognized(serde_json::Value),
}

/// 设备记录（看板的一行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// 设备名称（同一次拉取内唯一）
    pub device_name: String,

    /// 最后一次心跳时刻，无法解析时为空
    pub last_heartbeat_at: Option<DateTime<Utc>>,

    /// 距最后心跳的秒数，每次时钟滴答重新计算
    #[serde(skip)]
    pub elapsed_seconds: Option<u64>,

    /// 返回消息（后端为准，本地为缓存）
    pub return_message: Option<String>,

    /// 设备最近上报的报告
    pub report: Option<String>,

    /// 设备是否处于启用状态
    pub is_active: Option<bool>,
}

impl DeviceRecord {
    pub fn new(device_name: impl Into<String>, last_heartbeat_at: Option<DateTime<Utc>>) -> Self {
        Self {
            device_name: device_name.into(),
            last_heartbeat_at,
            elapsed_seconds: None,
            return_message: None,
            report: None,
            is_active: None,
        }
    }

    pub fn with_return_message(mut self, message: impl Into<String>) -> Self {
        self.return_message = Some(message.into());
        self
    }

    /// 用当前时刻重新计算经过秒数
    pub fn recompute_elapsed(&mut self, now: DateTime<Utc>) {
        self.elapsed_seconds = self
            .last_heartbeat_at
            .map(|instant| elapsed_seconds(instant, now));
    }

    /// 最后心跳在在线阈值以内
    pub fn is_online(&self) -> bool {
        self.elapsed_seconds
            .map(|seconds| seconds < ONLINE_THRESHOLD_SECS)
            .unwrap_or(false)
    }

    /// 返回消息的当前值，空值视为空字符串
    pub fn return_message_or_empty(&self) -> &str {
        self.return_message.as_deref().unwrap_or("")
    }
}

/// 统计在线设备数量
pub fn count_online(records: &[DeviceRecord]) -> u64 {
    records.iter().filter(|record| record.is_online()).count() as u64
}

/// 滚动历史中的一个点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatePoint {
    pub label: String,
    pub active_count: u64,
}

impl AggregatePoint {
    pub fn new(label: impl Into<String>, active_count: u64) -> Self {
        Self {
            label: label.into(),
            active_count,
        }
    }

    /// 以时刻作为标签
    pub fn at(instant: DateTime<Utc>, active_count: u64) -> Self {
        Self::new(instant.format("%H:%M:%S").to_string(), active_count)
    }
}

/// 心跳日志标签（后端可能返回文本或数字）
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LogLabel {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for LogLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLabel::Text(text) => f.write_str(text),
            LogLabel::Number(number) => write!(f, "{}", number),
        }
    }
}

/// 心跳日志中的一行 `[label, count]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeartbeatLogRow(pub LogLabel, pub u64);

impl From<HeartbeatLogRow> for AggregatePoint {
    fn from(row: HeartbeatLogRow) -> Self {
        AggregatePoint::new(row.0.to_string(), row.1)
    }
}

/// `GET /json/signals` 的响应
///
/// 设备列表保持为原始 JSON，以便逐条解析、单条失败不影响其他设备。
#[derive(Debug, Clone, Deserialize)]
pub struct SignalsPayload {
    pub devices: Vec<serde_json::Value>,

    #[serde(default)]
    pub heartbeat_log: Option<Vec<HeartbeatLogRow>>,
}

/// 单个设备在线格式
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceWire {
    pub device_name: String,

    #[serde(default)]
    pub last_heartbeat_timestamp: Option<RawTimestamp>,

    #[serde(default)]
    pub return_message: Option<String>,

    #[serde(default)]
    pub report: Option<String>,

    #[serde(default)]
    pub is_active: Option<bool>,
}

/// GPU 状态，原样透传给渲染层
pub type GpuInfo = serde_json::Value;

/// 单条设备记录的解析失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    /// 在响应设备列表中的位置
    pub position: usize,
    /// 设备名称（能读出时）
    pub device_name: Option<String>,
    pub reason: String,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.device_name {
            Some(name) => write!(f, "device #{} ({}): {}", self.position, name, self.reason),
            None => write!(f, "device #{}: {}", self.position, self.reason),
        }
    }
}

/// 把响应中的设备逐条转换为记录
///
/// 形状错误的条目被丢弃；时间戳无法识别的条目保留，但心跳时刻为空。
pub fn parse_devices(
    devices: Vec<serde_json::Value>,
    now: DateTime<Utc>,
) -> (Vec<DeviceRecord>, Vec<RecordError>) {
    let mut records = Vec::with_capacity(devices.len());
    let mut errors = Vec::new();

    for (position, value) in devices.into_iter().enumerate() {
        let name_hint = value
            .get("device_name")
            .and_then(|name| name.as_str())
            .map(str::to_string);

        let wire: DeviceWire = match serde_json::from_value(value) {
            Ok(wire) => wire,
            Err(e) => {
                errors.push(RecordError {
                    position,
                    device_name: name_hint,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let last_heartbeat_at = match wire.last_heartbeat_timestamp.as_ref().map(to_instant) {
            Some(Ok(instant)) => Some(instant),
            Some(Err(e)) => {
                errors.push(RecordError {
                    position,
                    device_name: Some(wire.device_name.clone()),
                    reason: e.to_string(),
                });
                None
            }
            None => None,
        };

        let mut record = DeviceRecord {
            device_name: wire.device_name,
            last_heartbeat_at,
            elapsed_seconds: None,
            return_message: wire.return_message,
            report: wire.report,
            is_active: wire.is_active,
        };
        record.recompute_elapsed(now);
        records.push(record);
    }

    (records, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    #[test]
    fn test_raw_timestamp_untagged() {
        let raw: RawTimestamp = serde_json::from_value(json!(1_700_000_000_000_i64)).unwrap();
        assert_eq!(raw, RawTimestamp::EpochMillis(1_700_000_000_000));

        let raw: RawTimestamp = serde_json::from_value(json!(12.5)).unwrap();
        assert_eq!(raw, RawTimestamp::EpochMillisFloat(12.5));

        let raw: RawTimestamp = serde_json::from_value(json!("2024-01-01T00:00:00Z")).unwrap();
        assert!(matches!(raw, RawTimestamp::Text(_)));

        let raw: RawTimestamp = serde_json::from_value(json!({"nested": 1})).unwrap();
        assert!(matches!(raw, RawTimestamp::Unrecognized(_)));
    }

    #[test]
    fn test_parse_devices_isolates_bad_records() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let ok_ts = (now - Duration::seconds(30)).to_rfc3339();
        let devices = vec![
            json!({"device_name": "alpha", "last_heartbeat_timestamp": ok_ts, "return_message": "hi"}),
            json!({"device_name": "beta", "last_heartbeat_timestamp": "not a date"}),
            json!({"last_heartbeat_timestamp": ok_ts}),
            json!({"device_name": "gamma", "last_heartbeat_timestamp": now.timestamp_millis()}),
        ];

        let (records, errors) = parse_devices(devices, now);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].device_name, "alpha");
        assert_eq!(records[0].elapsed_seconds, Some(30));
        assert_eq!(records[0].return_message.as_deref(), Some("hi"));
        assert_eq!(records[1].device_name, "beta");
        assert_eq!(records[1].last_heartbeat_at, None);
        assert_eq!(records[1].elapsed_seconds, None);
        assert_eq!(records[2].device_name, "gamma");
        assert_eq!(records[2].elapsed_seconds, Some(0));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].position, 1);
        assert_eq!(errors[0].device_name.as_deref(), Some("beta"));
        assert_eq!(errors[1].position, 2);
        assert_eq!(errors[1].device_name, None);
    }

    #[test]
    fn test_count_online() {
        let now = Utc::now();
        let mut fresh = DeviceRecord::new("fresh", Some(now - Duration::seconds(100)));
        let mut stale = DeviceRecord::new("stale", Some(now - Duration::seconds(700)));
        let unknown = DeviceRecord::new("unknown", None);
        fresh.recompute_elapsed(now);
        stale.recompute_elapsed(now);

        assert!(fresh.is_online());
        assert!(!stale.is_online());
        assert!(!unknown.is_online());
        assert_eq!(count_online(&[fresh, stale, unknown]), 1);
    }

    #[test]
    fn test_heartbeat_log_rows() {
        let payload: SignalsPayload = serde_json::from_value(json!({
            "devices": [],
            "heartbeat_log": [["2024-03-01 12:00:00", 4], [1709294400, 2]]
        }))
        .unwrap();

        let points: Vec<AggregatePoint> = payload
            .heartbeat_log
            .unwrap()
            .into_iter()
            .map(AggregatePoint::from)
            .collect();
        assert_eq!(points[0], AggregatePoint::new("2024-03-01 12:00:00", 4));
        assert_eq!(points[1], AggregatePoint::new("1709294400", 2));
    }
}
