use crate::render::{render_heartbeat_table, render_history, render_report_table, render_status};
use crate::signal::ShutdownSignal;
use anyhow::{anyhow, Result};
use beacon_core::{
    BoardContext, BoardError, Poller, ReturnMessageEditor, SnapshotStore, StoreEvent, ViewProfile,
};
use chrono::Local;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

/// 看板视图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardView {
    Heartbeat,
    Reports,
}

/// 渲染一帧
pub fn render_frame(store: &SnapshotStore, view: BoardView) -> Result<String> {
    let snapshot = store.snapshot()?;
    let mut frame = String::new();

    frame.push_str(&render_status(&snapshot));
    frame.push('\n');
    match view {
        BoardView::Heartbeat => {
            frame.push_str(&render_heartbeat_table(&snapshot.records, &Local));
            if !snapshot.history.is_empty() {
                frame.push_str("\nonline devices\n");
                frame.push_str(&render_history(&snapshot.history));
            }
            if !snapshot.heartbeat_log.is_empty() {
                frame.push_str("\nserver heartbeat log\n");
                frame.push_str(&render_history(&snapshot.heartbeat_log));
            }
        }
        BoardView::Reports => {
            frame.push_str(&render_report_table(&snapshot.records));
            if let Some(gpu) = &snapshot.gpu_info {
                frame.push_str(&format!("\ngpu: {}\n", gpu));
            }
        }
    }
    Ok(frame)
}

/// 持续轮询并输出，收到关闭信号后停止
pub async fn watch<F>(
    store: Arc<SnapshotStore>,
    profile: ViewProfile,
    view: BoardView,
    mut shutdown: broadcast::Receiver<ShutdownSignal>,
    mut output: F,
) -> Result<()>
where
    F: FnMut(String),
{
    let mut events = store.subscribe();
    let mut poller = Poller::new(store.clone(), profile);
    poller.start();

    loop {
        tokio::select! {
            signal = shutdown.recv() => {
                let signal = signal.map(|s| s.as_str()).unwrap_or("closed");
                info!(signal, "Stopping board");
                break;
            }
            event = events.recv() => match event {
                Ok(StoreEvent::Failed { error }) => {
                    warn!(error = %error, "Refresh failed, showing stale data");
                    output(render_frame(&store, view)?);
                }
                Ok(StoreEvent::ReturnMessageUpdated { .. }) => {}
                Ok(_) => output(render_frame(&store, view)?),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Board renderer lagging behind store events");
                    output(render_frame(&store, view)?);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    poller.stop();
    Ok(())
}

/// 修改单个设备的返回消息
///
/// 拉取一次设备列表，打开编辑、写入草稿并关闭以提交。
pub async fn edit_return_message(
    store: Arc<SnapshotStore>,
    context: BoardContext,
    device_name: &str,
    message: &str,
) -> Result<bool> {
    if context.token().is_none() {
        return Err(anyhow!("a bearer token is required to submit return messages"));
    }

    store.refresh().await?;
    let records = store.records()?;
    let index = records
        .iter()
        .position(|record| record.device_name == device_name)
        .ok_or_else(|| BoardError::NotFound(device_name.to_string()))?;

    let mut editor = ReturnMessageEditor::new(store.clone(), context);
    editor.toggle(index)?;
    editor.update_draft(message)?;
    let outcome = editor.toggle(index)?;

    match outcome.submission {
        Some(handle) => {
            handle.await?;
            Ok(true)
        }
        None => {
            info!(device = %device_name, "Return message unchanged");
            Ok(false)
        }
    }
}
