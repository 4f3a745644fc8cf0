use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use odds_http::RecoveryGateway;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio::time::interval_at;
use tracing::Instrument;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::warn;

use crate::handler::Backfill;
use crate::handler::FeedHandler;
use crate::handler::LifecycleEvent;
use crate::window::RecoveryControl;

/// Heartbeat configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Expected interval between feed heartbeats, also the check period (default: 10s)
    pub interval: Duration,

    /// Silent intervals tolerated before declaring the feed down (default: 3)
    pub missed_beats: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(10), missed_beats: 3 }
    }
}

impl HeartbeatConfig {
    /// Silence longer than this means the feed is down
    pub fn timeout(&self) -> Duration {
        self.interval.saturating_mul(self.missed_beats)
    }
}

/// Externally visible connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Up,
    Down,
}

// Internal phases. DISCONNECTING and RECOVERING are claimed by a single CAS winner.
// The reported state follows `down_at`, not the phase.
const UP: u8 = 0;
const DISCONNECTING: u8 = 1;
const DOWN: u8 = 2;
const RECOVERING: u8 = 3;

/// Liveness authority of the feed and orchestrator of recovery.
///
/// Any of `report_liveness`, `report_disconnection` and the periodic check may be
/// called concurrently. Entering DOWN and leaving it are each won by exactly one
/// caller per outage.
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    state: AtomicU8,
    clock: Instant,
    last_beat_ns: AtomicU64,
    beats: AtomicU64,
    down_at: Mutex<Option<OffsetDateTime>>,
    pending_disconnect: AtomicBool,
    disconnections: AtomicU64,
    recoveries: AtomicU64,
    gateway: Arc<dyn RecoveryGateway>,
    window: Arc<dyn RecoveryControl>,
    handler: Arc<dyn FeedHandler>,
    check_task: Mutex<Option<JoinHandle<()>>>,
    recovery_task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
    runtime: Handle,
}

impl HeartbeatMonitor {
    /// Creates a monitor in the UP state. Must be called within a Tokio runtime.
    pub fn new(
        config: HeartbeatConfig,
        gateway: Arc<dyn RecoveryGateway>,
        window: Arc<dyn RecoveryControl>,
        handler: Arc<dyn FeedHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: AtomicU8::new(UP),
            clock: Instant::now(),
            last_beat_ns: AtomicU64::new(0),
            beats: AtomicU64::new(0),
            down_at: Mutex::new(None),
            pending_disconnect: AtomicBool::new(false),
            disconnections: AtomicU64::new(0),
            recoveries: AtomicU64::new(0),
            gateway,
            window,
            handler,
            check_task: Mutex::new(None),
            recovery_task: Mutex::new(None),
            stopped: AtomicBool::new(false),
            runtime: Handle::current(),
        })
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Down exactly while an outage time is recorded
    pub fn state(&self) -> ConnectivityState {
        match *self.down_at.lock() {
            Some(_) => ConnectivityState::Down,
            None => ConnectivityState::Up,
        }
    }

    /// Wall-clock time the current outage was detected
    pub fn down_at(&self) -> Option<OffsetDateTime> {
        *self.down_at.lock()
    }

    pub fn since_last_beat(&self) -> Duration {
        Duration::from_nanos(self.now_ns().saturating_sub(self.last_beat_ns.load(Ordering::Acquire)))
    }

    /// Number of outages entered so far
    pub fn disconnections(&self) -> u64 {
        self.disconnections.load(Ordering::Acquire)
    }

    /// Number of completed recoveries
    pub fn recoveries(&self) -> u64 {
        self.recoveries.load(Ordering::Acquire)
    }

    /// Starts the periodic missed-heartbeat check. Calling it again while running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.check_task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        if self.config.interval.is_zero() {
            warn!("Heartbeat interval is zero, periodic check disabled");
            return;
        }

        let period = self.config.interval;
        let monitor = Arc::downgrade(self);
        *task = Some(self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                monitor.check();
            }
        }));

        info!(interval_secs = period.as_secs(), timeout_secs = self.config.timeout().as_secs(), "Heartbeat monitor started");
    }

    /// Stops the periodic check and cancels a recovery in flight. No recovery starts afterwards.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = self.recovery_task.lock().take() {
            if !task.is_finished() {
                task.abort();
                info!("Cancelled recovery in progress");
            }
        }
        if let Some(task) = self.check_task.lock().take() {
            task.abort();
            info!("Heartbeat monitor stopped");
        }
    }

    /// Records a liveness signal. Returns true when this call started a recovery.
    pub fn report_liveness(self: &Arc<Self>) -> bool {
        self.last_beat_ns.store(self.now_ns(), Ordering::SeqCst);
        self.beats.fetch_add(1, Ordering::SeqCst);
        self.begin_recovery()
    }

    /// Signals that the transport went away. Returns true when this call entered DOWN.
    pub fn report_disconnection(self: &Arc<Self>) -> bool {
        loop {
            match self.state.compare_exchange(UP, DISCONNECTING, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => {
                    let baseline = self.beats.load(Ordering::SeqCst);
                    self.enter_down("transport disconnected", baseline);
                    return true;
                }
                Err(RECOVERING) => {
                    // replayed by the recovery task once it is back UP
                    self.pending_disconnect.store(true, Ordering::SeqCst);
                    if self.state.load(Ordering::SeqCst) == RECOVERING || !self.pending_disconnect.swap(false, Ordering::SeqCst) {
                        debug!("Disconnection reported during recovery, deferred");
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
    }

    /// Periodic check body. Returns true when missed heartbeats moved the monitor to DOWN.
    pub fn check(self: &Arc<Self>) -> bool {
        if self.state.load(Ordering::Acquire) != UP {
            return false;
        }

        let baseline = self.beats.load(Ordering::SeqCst);
        let silent = self.since_last_beat();
        if silent <= self.config.timeout() {
            return false;
        }
        if self.state.compare_exchange(UP, DISCONNECTING, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return false;
        }

        warn!(silent_ms = silent.as_millis() as u64, "Missed heartbeats");
        self.enter_down("missed heartbeats", baseline);
        true
    }

    fn enter_down(self: &Arc<Self>, cause: &'static str, baseline: u64) {
        let _span = info_span!("disconnection", cause).entered();
        let down_at = OffsetDateTime::now_utc();
        *self.down_at.lock() = Some(down_at);
        self.disconnections.fetch_add(1, Ordering::AcqRel);
        warn!(%down_at, "Feed connectivity lost");

        self.window.open_recovery_window();
        self.handler.on_lifecycle(LifecycleEvent::Disconnection);
        self.state.store(DOWN, Ordering::SeqCst);

        // a beat that landed while we were DISCONNECTING found no DOWN state to recover from
        if self.beats.load(Ordering::SeqCst) != baseline {
            debug!("Liveness resumed during disconnection");
            self.begin_recovery();
        }
    }

    fn begin_recovery(self: &Arc<Self>) -> bool {
        if self.state.load(Ordering::SeqCst) != DOWN {
            return false;
        }

        // shutdown takes this lock after raising `stopped`, so it sees every spawned task
        let mut task = self.recovery_task.lock();
        if self.stopped.load(Ordering::SeqCst) {
            debug!("Monitor stopped, not recovering");
            return false;
        }
        if self.state.compare_exchange(DOWN, RECOVERING, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return false;
        }

        let monitor = Arc::clone(self);
        *task = Some(self.runtime.spawn(monitor.recover().instrument(info_span!("recovery"))));
        true
    }

    async fn recover(self: Arc<Self>) {
        let since = self.down_at();
        let until = OffsetDateTime::now_utc();
        info!(?since, "Liveness restored, starting recovery");

        match since {
            Some(since) => {
                let backfill = self.backfill(since, until).await;
                self.handler.on_backfill(&backfill);
            }
            None => warn!("No disconnection time recorded, skipping backfill"),
        }

        let replayed = self.window.close_recovery_window();
        self.recoveries.fetch_add(1, Ordering::AcqRel);
        info!(replayed, "Feed recovered");
        self.handler.on_lifecycle(LifecycleEvent::Reconnection);
        {
            let mut down_at = self.down_at.lock();
            *down_at = None;
            self.state.store(UP, Ordering::SeqCst);
        }

        if self.pending_disconnect.swap(false, Ordering::SeqCst) {
            self.report_disconnection();
        }
    }

    /// Both calls are attempted; either failing only marks the backfill incomplete
    async fn backfill(&self, since: OffsetDateTime, until: OffsetDateTime) -> Backfill {
        let mut complete = true;

        let markets = match self.gateway.recover_markets(since).await {
            Ok(markets) => {
                info!(records = markets.len(), "Recovered markets since disconnection");
                markets
            }
            Err(err) => {
                error!("Market recovery failed: {err}");
                complete = false;
                Vec::new()
            }
        };

        let matches = match self.gateway.matches_in_range(since, until).await {
            Ok(matches) => {
                info!(records = matches.len(), "Recovered matches modified during outage");
                matches
            }
            Err(err) => {
                error!("Match recovery failed: {err}");
                complete = false;
                Vec::new()
            }
        };

        Backfill { since, until, markets, matches, complete }
    }

    fn now_ns(&self) -> u64 {
        self.clock.elapsed().as_nanos() as u64
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.check_task.get_mut().take() {
            task.abort();
        }
    }
}
