use crate::store::{RefreshOutcome, RefreshTicket, SnapshotStore};
use crate::view::ViewProfile;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 轮询器
///
/// 持有两个互相独立的定时器：本地时钟滴答（只重算经过秒数）和网络刷新。
/// 启动时立即发起一次刷新；停止时取消定时器并推进存储代数，
/// 仍在途中的请求可以完成，但结果会被丢弃。
/// 所有请求都以启动时的代数登记，停止之后登记的请求同样作废。
pub struct Poller {
    store: Arc<SnapshotStore>,
    profile: ViewProfile,
    cancel: Option<CancellationToken>,
}

impl Poller {
    pub fn new(store: Arc<SnapshotStore>, profile: ViewProfile) -> Self {
        Self {
            store,
            profile,
            cancel: None,
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn profile(&self) -> &ViewProfile {
        &self.profile
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }

    /// 启动轮询，必须在 tokio 运行时内调用
    pub fn start(&mut self) {
        if self.cancel.is_some() {
            warn!(view = %self.profile.name, "Poller is already running");
            return;
        }

        let cancel = CancellationToken::new();
        let generation = self.store.generation();

        info!(
            view = %self.profile.name,
            generation,
            clock_tick = ?self.profile.clock_tick,
            network_refresh = ?self.profile.network_refresh,
            "Poller started"
        );

        spawn_refresh(self.store.clone(), self.store.begin_refresh_at(generation));

        let network_refresh = usable_period(&self.profile.name, "network_refresh", self.profile.network_refresh);
        if let Some(period) = network_refresh {
            tokio::spawn(network_loop(
                self.store.clone(),
                generation,
                period,
                cancel.clone(),
            ));
        }

        let clock_tick = usable_period(&self.profile.name, "clock_tick", self.profile.clock_tick);
        if let Some(period) = clock_tick {
            tokio::spawn(clock_loop(
                self.store.clone(),
                generation,
                period,
                cancel.clone(),
            ));
        }

        self.cancel = Some(cancel);
    }

    /// 停止轮询，可重复调用
    pub fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };

        cancel.cancel();
        let generation = self.store.invalidate();
        info!(view = %self.profile.name, generation, "Poller stopped");
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 零间隔的定时器不启动
fn usable_period(view: &str, timer: &str, period: Option<Duration>) -> Option<Duration> {
    match period {
        Some(period) if period.is_zero() => {
            warn!(view = %view, timer = %timer, "Zero interval requested, timer disabled");
            None
        }
        other => other,
    }
}

/// 执行已登记的刷新，不等待结果
fn spawn_refresh(store: Arc<SnapshotStore>, ticket: RefreshTicket) {
    tokio::spawn(async move {
        match store.refresh_with(ticket).await {
            Ok(RefreshOutcome::Applied(_)) => {}
            Ok(RefreshOutcome::Discarded { generation }) => {
                debug!(generation, "Refresh finished after teardown");
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, will retry on next interval");
            }
        }
    });
}

async fn network_loop(
    store: Arc<SnapshotStore>,
    generation: u64,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                spawn_refresh(store.clone(), store.begin_refresh_at(generation));
            }
        }
    }
    debug!("Network refresh timer cancelled");
}

async fn clock_loop(
    store: Arc<SnapshotStore>,
    generation: u64,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if store.generation() != generation {
                    break;
                }
                if let Err(e) = store.tick(Utc::now()) {
                    warn!(error = %e, "Clock tick failed");
                }
            }
        }
    }
    debug!("Clock timer cancelled");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BearerToken, SignalBackend};
    use crate::error::Result;
    use crate::model::{GpuInfo, SignalsPayload};
    use crate::store::StoreEvent;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// 每次拉取需要一个许可；许可充足时立即返回一台设备
    struct GatedBackend {
        fetches: AtomicUsize,
        gate: Semaphore,
    }

    impl GatedBackend {
        fn open() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                gate: Semaphore::new(Semaphore::MAX_PERMITS),
            }
        }

        fn closed() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                gate: Semaphore::new(0),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SignalBackend for GatedBackend {
        async fn fetch_signals(&self) -> Result<SignalsPayload> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
            Ok(serde_json::from_value(json!({
                "devices": [{
                    "device_name": "sensor-01",
                    "last_heartbeat_timestamp": Utc::now().timestamp_millis(),
                }]
            }))?)
        }

        async fn fetch_gpu_info(&self) -> Result<GpuInfo> {
            Ok(json!({}))
        }

        async fn submit_return_message(&self, _: &str, _: &str, _: &BearerToken) -> Result<()> {
            Ok(())
        }
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn poller_for(backend: Arc<GatedBackend>, profile: ViewProfile) -> Poller {
        let store = Arc::new(SnapshotStore::new(backend, profile.store_options()));
        Poller::new(store, profile)
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_refresh_then_interval() {
        let backend = Arc::new(GatedBackend::open());
        let profile = ViewProfile::heartbeat_board().with_clock_tick(None);
        let mut poller = poller_for(backend.clone(), profile);

        poller.start();
        settle().await;
        assert_eq!(backend.fetches(), 1);
        assert_eq!(poller.store().records().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(backend.fetches(), 2);

        tokio::time::sleep(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(backend.fetches(), 4);
        assert_eq!(poller.store().history().unwrap().len(), 4);

        poller.stop();
        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(backend.fetches(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_fetch_profile_arms_no_timers() {
        let backend = Arc::new(GatedBackend::open());
        let mut poller = poller_for(backend.clone(), ViewProfile::return_message());

        poller.start();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        settle().await;

        assert_eq!(backend.fetches(), 1);
        assert!(poller.store().history().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_ticks_without_network() {
        let backend = Arc::new(GatedBackend::open());
        let profile = ViewProfile::heartbeat_board().with_network_refresh(None);
        let mut poller = poller_for(backend.clone(), profile);
        let mut events = poller.store().subscribe();

        poller.start();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        settle().await;
        poller.stop();

        let mut ticks = 0;
        let mut refreshes = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                StoreEvent::Ticked { .. } => ticks += 1,
                StoreEvent::Refreshed { .. } => refreshes += 1,
                _ => {}
            }
        }
        assert_eq!(ticks, 5);
        assert_eq!(refreshes, 1);
        assert_eq!(backend.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_pending_refresh() {
        let backend = Arc::new(GatedBackend::closed());
        let mut poller = poller_for(backend.clone(), ViewProfile::heartbeat_board());
        let store = poller.store().clone();

        poller.start();
        settle().await;
        assert_eq!(backend.fetches(), 1);
        assert!(store.snapshot().unwrap().loading);

        poller.stop();
        backend.gate.add_permits(1);
        settle().await;

        let snapshot = store.snapshot().unwrap();
        assert!(snapshot.records.is_empty());
        assert!(snapshot.history.is_empty());
        assert!(!snapshot.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_are_idempotent() {
        let backend = Arc::new(GatedBackend::open());
        let mut poller = poller_for(backend.clone(), ViewProfile::reports());
        let store = poller.store().clone();

        poller.start();
        poller.start();
        settle().await;
        assert!(poller.is_running());
        assert_eq!(backend.fetches(), 1);

        poller.stop();
        poller.stop();
        assert!(!poller.is_running());
        assert_eq!(store.generation(), 1);

        poller.start();
        settle().await;
        assert_eq!(backend.fetches(), 2);
        drop(poller);
        assert_eq!(store.generation(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_refresh_runs_leaves_store_empty() {
        let backend = Arc::new(GatedBackend::open());
        let mut poller = poller_for(backend.clone(), ViewProfile::heartbeat_board());
        let store = poller.store().clone();

        poller.start();
        assert!(store.snapshot().unwrap().loading);
        poller.stop();
        settle().await;

        tokio::time::sleep(Duration::from_secs(120)).await;
        settle().await;

        let snapshot = store.snapshot().unwrap();
        assert_eq!(backend.fetches(), 0);
        assert!(snapshot.records.is_empty());
        assert!(snapshot.history.is_empty());
        assert!(!snapshot.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_clock_tick_disables_only_that_timer() {
        let backend = Arc::new(GatedBackend::open());
        let profile = ViewProfile::heartbeat_board().with_clock_tick(Some(Duration::ZERO));
        let mut poller = poller_for(backend.clone(), profile);
        let mut events = poller.store().subscribe();

        poller.start();
        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;
        poller.stop();

        let mut ticks = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, StoreEvent::Ticked { .. }) {
                ticks += 1;
            }
        }
        assert_eq!(ticks, 0);
        assert_eq!(backend.fetches(), 2);
    }
}
