use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use futures::StreamExt;
use odds_http::RecoveryGateway;
use odds_types::OddsConverter;
use odds_types::OddsFormats;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::Instrument;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::warn;

use crate::amqp::DEFAULT_EXCHANGE;
use crate::backoff::BackoffConfig;
use crate::backoff::ReconnectBackoff;
use crate::dispatch::Dispatcher;
use crate::dispatch::Disposition;
use crate::errors::FeedError;
use crate::errors::Result;
use crate::handler::FeedHandler;
use crate::heartbeat::HeartbeatConfig;
use crate::heartbeat::HeartbeatMonitor;
use crate::transport::Broker;
use crate::transport::BrokerSession;
use crate::transport::DeliveryStream;
use crate::transport::QueueBinding;
use crate::transport::ShutdownHook;
use crate::window::RecoveryWindow;

/// Everything FeedConnection needs besides its collaborators
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub exchange: String,
    pub bindings: Vec<QueueBinding>,
    pub heartbeat: HeartbeatConfig,
    pub backoff: BackoffConfig,
    pub odds: OddsFormats,
    /// Log business payloads at INFO instead of DEBUG
    pub always_log_payload: bool,
}

impl ConnectionConfig {
    pub fn new(bindings: Vec<QueueBinding>) -> Self {
        Self {
            exchange: DEFAULT_EXCHANGE.to_string(),
            bindings,
            heartbeat: HeartbeatConfig::default(),
            backoff: BackoffConfig::default(),
            odds: OddsFormats::none(),
            always_log_payload: false,
        }
    }
}

struct ActiveSession {
    session: Box<dyn BrokerSession>,
    consumers: Vec<JoinHandle<()>>,
}

/// Resilient feed consumer.
///
/// Owns the broker session, reconnects with backoff, and routes deliveries through
/// the heartbeat monitor and recovery window. Must be created within a Tokio runtime.
pub struct FeedConnection {
    config: ConnectionConfig,
    broker: Arc<dyn Broker>,
    monitor: Arc<HeartbeatMonitor>,
    window: Arc<RecoveryWindow>,
    dispatcher: Arc<Dispatcher>,
    backoff: ReconnectBackoff,
    session: tokio::sync::Mutex<Option<ActiveSession>>,
    /// Id of the installed session, 0 while none is live
    active_generation: AtomicU64,
    next_generation: AtomicU64,
    reconnecting: AtomicBool,
    closing: AtomicBool,
    reconnect_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

impl FeedConnection {
    pub fn new(
        config: ConnectionConfig,
        broker: Arc<dyn Broker>,
        gateway: Arc<dyn RecoveryGateway>,
        handler: Arc<dyn FeedHandler>,
    ) -> Arc<Self> {
        let window = Arc::new(RecoveryWindow::new(Arc::clone(&handler)));
        let monitor = HeartbeatMonitor::new(config.heartbeat, gateway, window.clone(), Arc::clone(&handler));
        let dispatcher =
            Arc::new(Dispatcher::new(monitor.clone(), window.clone(), handler, OddsConverter::new(config.odds), config.always_log_payload));
        let backoff = ReconnectBackoff::new(config.backoff);

        Arc::new(Self {
            config,
            broker,
            monitor,
            window,
            dispatcher,
            backoff,
            session: tokio::sync::Mutex::new(None),
            active_generation: AtomicU64::new(0),
            next_generation: AtomicU64::new(1),
            reconnecting: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            reconnect_task: parking_lot::Mutex::new(None),
            runtime: Handle::current(),
        })
    }

    pub fn monitor(&self) -> &Arc<HeartbeatMonitor> {
        &self.monitor
    }

    pub fn window(&self) -> &Arc<RecoveryWindow> {
        &self.window
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Current reconnect attempt number, 1 after a successful connect
    pub fn attempt(&self) -> u32 {
        self.backoff.attempt()
    }

    pub fn is_connected(&self) -> bool {
        self.active_generation.load(Ordering::Acquire) != 0
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Starts the heartbeat check and runs one connect sequence.
    ///
    /// A failure is logged and handed to the reconnect scheduler, never returned.
    pub async fn connect(self: &Arc<Self>) {
        self.monitor.start();
        if let Err(err) = self.establish().instrument(info_span!("connect")).await {
            error!(attempt = self.backoff.attempt(), "Connection failed: {err}");
            self.schedule_reconnect();
        }
    }

    /// Best-effort teardown: every step runs and errors are only logged
    pub async fn shutdown(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down feed connection");

        if let Some(task) = self.reconnect_task.lock().take() {
            task.abort();
            debug!("Cancelled pending reconnect");
        }
        self.monitor.shutdown();

        let active = self.session.lock().await.take();
        self.active_generation.store(0, Ordering::Release);
        if let Some(active) = active {
            release(active).await;
        }

        let buffered = self.window.buffered();
        if buffered > 0 {
            warn!(buffered, "Discarding messages buffered for an unfinished recovery");
        }
        info!("Feed connection closed");
    }

    async fn establish(self: &Arc<Self>) -> Result<()> {
        let mut current = self.session.lock().await;
        if self.is_closing() {
            return Err(FeedError::ShuttingDown);
        }

        if let Some(previous) = current.take() {
            self.active_generation.store(0, Ordering::Release);
            debug!("Releasing previous session");
            release(previous).await;
        }

        let attempt = self.backoff.attempt();
        info!(attempt, exchange = %self.config.exchange, "Connecting to feed (attempt #{attempt})");
        let session = self.broker.open().await?;
        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel);

        let consumers = match self.prepare(session.as_ref(), generation).await {
            Ok(consumers) => consumers,
            Err(err) => {
                if let Err(close_err) = session.close().await {
                    debug!("Error closing half-open session: {close_err}");
                }
                return Err(err);
            }
        };

        *current = Some(ActiveSession { session, consumers });
        self.active_generation.store(generation, Ordering::Release);
        drop(current);

        self.backoff.reset();
        self.monitor.report_liveness();
        info!(queues = self.config.bindings.len(), "Connected to feed");
        Ok(())
    }

    /// Declares the topology and starts one consumer per binding
    async fn prepare(self: &Arc<Self>, session: &dyn BrokerSession, generation: u64) -> Result<Vec<JoinHandle<()>>> {
        let exchange = self.config.exchange.as_str();
        session.declare_exchange(exchange).await?;
        for binding in &self.config.bindings {
            session.declare_binding(exchange, binding).await?;
            info!(queue = %binding.queue_name, routing_key = %binding.routing_key, "Queue bound");
        }

        session.on_shutdown(self.shutdown_hook(generation));

        let mut consumers = Vec::with_capacity(self.config.bindings.len());
        for binding in &self.config.bindings {
            match session.consume(&binding.queue_name, &binding.consumer_tag()).await {
                Ok(stream) => {
                    let queue = binding.queue_name.clone();
                    let consumer = consume(Arc::clone(&self.dispatcher), stream).instrument(info_span!("consumer", queue = %queue));
                    consumers.push(self.runtime.spawn(consumer));
                }
                Err(err) => {
                    consumers.iter().for_each(JoinHandle::abort);
                    return Err(err.into());
                }
            }
        }
        Ok(consumers)
    }

    fn shutdown_hook(self: &Arc<Self>, generation: u64) -> ShutdownHook {
        let feed = Arc::downgrade(self);
        Box::new(move |reason: String| {
            let Some(feed) = feed.upgrade() else {
                return;
            };
            let _span = info_span!("shutdown_signal", generation).entered();
            if feed.is_closing() {
                debug!("Transport closed during shutdown: {reason}");
                return;
            }
            if feed.active_generation.compare_exchange(generation, 0, Ordering::AcqRel, Ordering::Acquire).is_err() {
                debug!("Ignoring shutdown of superseded session: {reason}");
                return;
            }

            warn!("Transport shut down: {reason}");
            feed.monitor.report_disconnection();
            feed.schedule_reconnect();
        })
    }

    /// Spawns the reconnect loop unless one is already running or shutdown has begun
    fn schedule_reconnect(self: &Arc<Self>) {
        if self.is_closing() {
            debug!("Shutdown in progress, not reconnecting");
            return;
        }
        if self.reconnecting.swap(true, Ordering::AcqRel) {
            debug!("Reconnect already scheduled");
            return;
        }

        let feed = Arc::clone(self);
        let task = self.runtime.spawn(feed.reconnect_loop().instrument(info_span!("reconnect")));
        *self.reconnect_task.lock() = Some(task);
    }

    async fn reconnect_loop(self: Arc<Self>) {
        loop {
            let attempt = self.backoff.attempt();
            let delay = self.backoff.delay();
            warn!(attempt, delay_secs = delay.as_secs(), "Reconnecting in {}s", delay.as_secs());
            tokio::time::sleep(delay).await;
            self.backoff.advance();

            match self.establish().await {
                Ok(()) => {
                    self.reconnecting.store(false, Ordering::Release);
                    // a drop of the fresh session that raced this handover found us still scheduled
                    if self.is_connected() || self.is_closing() || self.reconnecting.swap(true, Ordering::AcqRel) {
                        return;
                    }
                }
                Err(FeedError::ShuttingDown) => return,
                Err(err) => error!(attempt = self.backoff.attempt(), "Reconnect failed: {err}"),
            }
        }
    }
}

async fn release(active: ActiveSession) {
    active.consumers.iter().for_each(JoinHandle::abort);
    if let Err(err) = active.session.close().await {
        warn!("Error closing broker session: {err}");
    }
}

async fn consume(dispatcher: Arc<Dispatcher>, mut deliveries: DeliveryStream) {
    while let Some(next) = deliveries.next().await {
        let delivery = match next {
            Ok(delivery) => delivery,
            Err(err) => {
                warn!("Consumer stream failed: {err}");
                break;
            }
        };

        let settled = match dispatcher.dispatch(&delivery.routing_key, &delivery.body) {
            Disposition::Ack => delivery.acker.ack().await,
            Disposition::Requeue => delivery.acker.nack(true).await,
            Disposition::Reject => delivery.acker.nack(false).await,
        };
        if let Err(err) = settled {
            warn!(routing_key = %delivery.routing_key, "Failed to settle delivery: {err}");
        }
    }
    debug!("Consumer stopped");
}
