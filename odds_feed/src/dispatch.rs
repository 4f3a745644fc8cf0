use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use odds_types::Envelope;
use odds_types::FeedMessage;
use odds_types::OddsConverter;
use odds_types::decode;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::warn;

use crate::handler::FeedHandler;
use crate::heartbeat::HeartbeatMonitor;
use crate::window::RecoveryWindow;

/// How a delivery is settled with the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Negative acknowledgement asking for redelivery
    Requeue,
    /// Negative acknowledgement without redelivery
    Reject,
}

/// Delivery counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub heartbeats: AtomicU64,
    pub delivered: AtomicU64,
    pub buffered: AtomicU64,
    pub failed: AtomicU64,
    pub rejected: AtomicU64,
}

/// Routes each delivery to liveness tracking, the recovery window or the handler
pub struct Dispatcher {
    monitor: Arc<HeartbeatMonitor>,
    window: Arc<RecoveryWindow>,
    handler: Arc<dyn FeedHandler>,
    converter: OddsConverter,
    always_log_payload: bool,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(
        monitor: Arc<HeartbeatMonitor>,
        window: Arc<RecoveryWindow>,
        handler: Arc<dyn FeedHandler>,
        converter: OddsConverter,
        always_log_payload: bool,
    ) -> Self {
        Self { monitor, window, handler, converter, always_log_payload, stats: DispatchStats::default() }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn dispatch(&self, routing_key: &str, body: &[u8]) -> Disposition {
        let envelope = match decode(routing_key, body, &self.converter) {
            Ok(envelope) => envelope,
            Err(err) => {
                // a malformed body would fail the same way on every redelivery
                warn!(routing_key, bytes = body.len(), "Rejecting undecodable message: {err}");
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                return Disposition::Reject;
            }
        };

        match envelope {
            Envelope::Heartbeat => {
                self.stats.heartbeats.fetch_add(1, Ordering::Relaxed);
                debug!(routing_key, "Heartbeat");
                self.monitor.report_liveness();
                Disposition::Ack
            }
            Envelope::Business(message) => match self.window.offer(message) {
                None => {
                    self.stats.buffered.fetch_add(1, Ordering::Relaxed);
                    Disposition::Ack
                }
                Some(message) => self.deliver(&message),
            },
        }
    }

    fn deliver(&self, message: &FeedMessage) -> Disposition {
        let meta = &message.meta;
        let _span = info_span!(
            "delivery",
            routing_key = %message.routing_key,
            message_type = %message.message_type,
            event_type = %meta.event_type,
            event_id = %meta.event_id,
            action = %meta.action,
        )
        .entered();

        if self.always_log_payload {
            info!(payload = ?message.payload, "Event");
        } else {
            info!("Event");
            debug!(payload = ?message.payload, "Event payload");
        }

        match self.handler.on_message(message) {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                Disposition::Ack
            }
            Err(err) => {
                error!("Handler failed, requesting redelivery: {err:#}");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                Disposition::Requeue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use odds_types::OddsFormats;

    use super::*;
    use crate::heartbeat::ConnectivityState;
    use crate::heartbeat::HeartbeatConfig;
    use crate::testing::Event;
    use crate::testing::RecordingHandler;
    use crate::testing::StubGateway;
    use crate::testing::wait_until;

    const MARKETS_KEY: &str = "pandascore.markets.game.12.markets.odds_changed";

    struct Fixture {
        dispatcher: Dispatcher,
        monitor: Arc<HeartbeatMonitor>,
        window: Arc<RecoveryWindow>,
        handler: Arc<RecordingHandler>,
    }

    fn fixture() -> Fixture {
        let handler = RecordingHandler::new();
        let window = Arc::new(RecoveryWindow::new(handler.clone()));
        let monitor = HeartbeatMonitor::new(HeartbeatConfig::default(), StubGateway::new(), window.clone(), handler.clone());
        let converter = OddsConverter::new(OddsFormats::new(true, true));
        let dispatcher = Dispatcher::new(monitor.clone(), window.clone(), handler.clone(), converter, false);
        Fixture { dispatcher, monitor, window, handler }
    }

    fn body(tag: &str) -> Vec<u8> {
        format!(r#"{{"type": "{tag}", "id": 1}}"#).into_bytes()
    }

    #[tokio::test]
    async fn test_heartbeat_is_acked_not_forwarded() {
        let f = fixture();
        assert_eq!(f.dispatcher.dispatch("#", br#"{"type": "v1.beat"}"#), Disposition::Ack);
        assert!(f.handler.events().is_empty());
        assert_eq!(f.dispatcher.stats().heartbeats.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_business_message_forwarded() {
        let f = fixture();
        assert_eq!(f.dispatcher.dispatch(MARKETS_KEY, &body("fixture")), Disposition::Ack);
        assert_eq!(f.handler.events(), vec![Event::Message("fixture".into())]);
    }

    #[tokio::test]
    async fn test_handler_failure_requests_redelivery() {
        let f = fixture();
        f.handler.fail_on("scoreboard");
        assert_eq!(f.dispatcher.dispatch(MARKETS_KEY, &body("scoreboard")), Disposition::Requeue);
        assert_eq!(f.dispatcher.stats().failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_invalid_json_rejected() {
        let f = fixture();
        assert_eq!(f.dispatcher.dispatch(MARKETS_KEY, b"{not json"), Disposition::Reject);
        assert!(f.handler.events().is_empty());
    }

    #[tokio::test]
    async fn test_open_window_buffers_and_acks() {
        let f = fixture();
        f.window.open();

        // acked even though the handler would fail: the broker must not hold it
        f.handler.fail_on("scoreboard");
        assert_eq!(f.dispatcher.dispatch(MARKETS_KEY, &body("scoreboard")), Disposition::Ack);
        assert_eq!(f.dispatcher.dispatch(MARKETS_KEY, &body("fixture")), Disposition::Ack);

        assert!(f.handler.events().is_empty());
        assert_eq!(f.window.buffered(), 2);
    }

    #[tokio::test]
    async fn test_outage_scenario_orders_backfill_before_replay() {
        let f = fixture();

        f.monitor.report_disconnection();
        f.dispatcher.dispatch(MARKETS_KEY, &body("first"));
        f.dispatcher.dispatch(MARKETS_KEY, &body("second"));
        f.dispatcher.dispatch("#", br#"{"type": "v1.beat"}"#);

        wait_until(|| f.monitor.state() == ConnectivityState::Up).await;
        assert_eq!(
            f.handler.events(),
            vec![
                Event::Lifecycle(crate::LifecycleEvent::Disconnection),
                Event::Backfill { markets: 1, matches: 1, complete: true },
                Event::Message("first".into()),
                Event::Message("second".into()),
                Event::Lifecycle(crate::LifecycleEvent::Reconnection),
            ]
        );
        assert!(!f.window.is_open());

        f.dispatcher.dispatch(MARKETS_KEY, &body("live"));
        assert_eq!(f.handler.events().last(), Some(&Event::Message("live".into())));
    }
}
