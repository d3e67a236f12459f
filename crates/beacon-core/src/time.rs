//! 心跳时间换算
//!
//! 把后端返回的时间戳转换为内部时刻，计算距今秒数，并格式化成看板上显示的字符串。

use crate::error::{BoardError, Result};
use crate::model::RawTimestamp;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fmt::Display;

/// 小于该秒数的设备视为在线
pub const ONLINE_THRESHOLD_SECS: u64 = 600;

/// 一天的秒数，达到后只显示天数
pub const SECONDS_PER_DAY: u64 = 86_400;

/// 在线设备显示的固定字符串
pub const ONLINE_INDICATOR: &str = "🆗 Online";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// 解析后端时间戳
///
/// 支持毫秒级 epoch（整数、小数或数字字符串）、RFC 3339 文本，
/// 以及不带时区的 ISO 文本（按 UTC 处理）。
///
/// # 错误
/// * `Parse` - 无法识别的时间戳编码
pub fn to_instant(raw: &RawTimestamp) -> Result<DateTime<Utc>> {
    match raw {
        RawTimestamp::EpochMillis(ms) => from_epoch_millis(*ms),
        RawTimestamp::EpochMillisFloat(ms) => {
            if !ms.is_finite() {
                return Err(BoardError::parse(format!("non-finite epoch value: {}", ms)));
            }
            from_epoch_millis(ms.trunc() as i64)
        }
        RawTimestamp::Text(text) => parse_text(text),
        RawTimestamp::Unrecognized(value) => Err(BoardError::parse(format!(
            "unrecognized timestamp encoding: {}",
            value
        ))),
    }
}

fn from_epoch_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| BoardError::parse(format!("epoch milliseconds out of range: {}", ms)))
}

fn parse_text(text: &str) -> Result<DateTime<Utc>> {
    let trimmed = text.trim();

    if let Ok(ms) = trimmed.parse::<i64>() {
        return from_epoch_millis(ms);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(BoardError::parse(format!("unrecognized timestamp text: {:?}", text)))
}

/// 计算 `instant` 到 `now` 经过的整秒数，未来时刻截断为 0
pub fn elapsed_seconds(instant: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = now.signed_duration_since(instant).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis / 1000) as u64
    }
}

/// 把经过秒数格式化为看板显示文本
///
/// 十分钟以内显示在线标识；满一天后只显示天数，时分秒被舍去。
pub fn format_duration(total_seconds: u64) -> String {
    if total_seconds < ONLINE_THRESHOLD_SECS {
        return ONLINE_INDICATOR.to_string();
    }

    let days = total_seconds / SECONDS_PER_DAY;
    if days > 0 {
        return format!("{}day(s)", days);
    }

    let hours = total_seconds % SECONDS_PER_DAY / 3600;
    let minutes = total_seconds % 3600 / 60;
    let seconds = total_seconds % 60;

    let mut rendered = format!("{}s", seconds);
    if minutes > 0 {
        rendered = format!("{}m {}", minutes, rendered);
    }
    if hours > 0 {
        rendered = format!("{}h {}", hours, rendered);
    }
    rendered
}

/// 超过一天未收到心跳时需要高亮警告
pub fn is_over_one_day(seconds: u64) -> bool {
    seconds > SECONDS_PER_DAY
}

/// 格式化心跳时刻，缺失时显示 `-`
pub fn format_timestamp<Tz>(instant: Option<&DateTime<Tz>>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match instant {
        Some(dt) => dt.format("%Y/%m/%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}
