//! 纯文本渲染

use beacon_core::{
    format_duration, format_timestamp, is_over_one_day, AggregatePoint, DeviceRecord, Snapshot,
};
use chrono::TimeZone;
use std::fmt::{Display, Write};

/// 柱状图最大宽度
pub const BAR_WIDTH: usize = 30;

/// 状态行：设备数、在线数、加载与错误标记
pub fn render_status(snapshot: &Snapshot) -> String {
    let mut line = format!(
        "devices: {}  online: {}",
        snapshot.records.len(),
        snapshot.online_count()
    );
    if snapshot.loading {
        line.push_str("  [loading]");
    }
    if snapshot.errored {
        match &snapshot.last_error {
            Some(error) => {
                let _ = write!(line, "  [stale: {}]", error);
            }
            None => line.push_str("  [stale]"),
        }
    }
    line
}

/// 心跳表，超过一天的行以 `!` 标记
pub fn render_heartbeat_table<Tz>(records: &[DeviceRecord], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let rows: Vec<[String; 4]> = records
        .iter()
        .map(|record| {
            let since = match record.elapsed_seconds {
                Some(seconds) if is_over_one_day(seconds) => {
                    format!("! {}", format_duration(seconds))
                }
                Some(seconds) => format_duration(seconds),
                None => "-".to_string(),
            };
            let local = record.last_heartbeat_at.map(|at| at.with_timezone(tz));
            [
                record.device_name.clone(),
                format_timestamp(local.as_ref()),
                since,
                record.return_message_or_empty().to_string(),
            ]
        })
        .collect();

    render_rows(["DEVICE", "LAST HEARTBEAT", "SINCE", "RETURN MESSAGE"], &rows)
}

/// 报告表
pub fn render_report_table(records: &[DeviceRecord]) -> String {
    let rows: Vec<[String; 3]> = records
        .iter()
        .map(|record| {
            let active = match record.is_active {
                Some(true) => "yes",
                Some(false) => "no",
                None => "-",
            };
            [
                record.device_name.clone(),
                active.to_string(),
                record.report.clone().unwrap_or_default(),
            ]
        })
        .collect();

    render_rows(["DEVICE", "ACTIVE", "REPORT"], &rows)
}

/// 在线数历史，每个点一行
pub fn render_history(points: &[AggregatePoint]) -> String {
    let max = points.iter().map(|p| p.active_count).max().unwrap_or(0);
    let label_width = points.iter().map(|p| p.label.len()).max().unwrap_or(0);

    let mut out = String::new();
    for point in points {
        let bar = if max == 0 {
            0
        } else {
            (point.active_count as usize * BAR_WIDTH).div_ceil(max as usize)
        };
        let _ = writeln!(
            out,
            "{:<width$} |{} {}",
            point.label,
            "#".repeat(bar),
            point.active_count,
            width = label_width
        );
    }
    out
}

fn render_rows<const N: usize>(header: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = header.map(|h| h.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, header.iter().copied(), &widths);
    for row in rows {
        push_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}
