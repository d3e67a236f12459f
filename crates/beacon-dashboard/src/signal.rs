use std::fmt;
use std::io;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

/// 让看板停止轮询的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Term,
    Interrupt,
    /// 程序内部请求（信号处理器安装失败等）
    Manual,
}

impl ShutdownSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownSignal::Term => "SIGTERM",
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Manual => "manual",
        }
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 把进程信号转发给 `watch` 循环
pub struct SignalHandler {
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl SignalHandler {
    pub fn new() -> (Self, broadcast::Receiver<ShutdownSignal>) {
        let (tx, rx) = broadcast::channel(4);
        (Self { shutdown_tx: tx }, rx)
    }

    /// 等待 SIGTERM 或 SIGINT，收到后转发
    #[cfg(unix)]
    pub async fn wait_for_system_signal(&self) -> io::Result<ShutdownSignal> {
        use signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let received = tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Term,
            _ = sigint.recv() => ShutdownSignal::Interrupt,
        };
        self.forward(received);
        Ok(received)
    }

    #[cfg(not(unix))]
    pub async fn wait_for_system_signal(&self) -> io::Result<ShutdownSignal> {
        signal::ctrl_c().await?;
        self.forward(ShutdownSignal::Interrupt);
        Ok(ShutdownSignal::Interrupt)
    }

    pub fn trigger_shutdown(&self) {
        self.forward(ShutdownSignal::Manual);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.shutdown_tx.subscribe()
    }

    /// 没有订阅者时（看板已经退出）静默丢弃
    fn forward(&self, signal: ShutdownSignal) -> usize {
        let receivers = self.shutdown_tx.send(signal).unwrap_or(0);
        info!(signal = signal.as_str(), receivers, "Shutdown requested");
        receivers
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new().0
    }
}
