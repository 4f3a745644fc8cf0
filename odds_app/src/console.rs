//! Handler that reports feed traffic through the log.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use odds_feed::Backfill;
use odds_feed::FeedHandler;
use odds_feed::LifecycleEvent;
use odds_types::FeedMessage;
use odds_types::Payload;
use tracing::info;
use tracing::warn;

#[derive(Debug, Default)]
pub struct ConsoleHandler {
    messages: AtomicU64,
    backfills: AtomicU64,
}

impl ConsoleHandler {
    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn backfills(&self) -> u64 {
        self.backfills.load(Ordering::Relaxed)
    }
}

impl FeedHandler for ConsoleHandler {
    fn on_message(&self, message: &FeedMessage) -> anyhow::Result<()> {
        let seq = self.messages.fetch_add(1, Ordering::Relaxed) + 1;
        match &message.payload {
            Payload::Markets(markets) => {
                let selections: usize = markets.markets.iter().map(|market| market.selections.len()).sum();
                info!(seq, event_id = %message.meta.event_id, markets = markets.markets.len(), selections, "markets");
            }
            Payload::Fixture(fixture) => {
                let name = fixture.fixture.as_ref().and_then(|m| m.name.as_deref()).unwrap_or("-");
                info!(seq, event_id = %message.meta.event_id, action = ?fixture.action, name, "fixture");
            }
            Payload::Raw(_) => info!(seq, message_type = %message.message_type, routing_key = %message.routing_key, "message"),
        }
        Ok(())
    }

    fn on_backfill(&self, backfill: &Backfill) {
        self.backfills.fetch_add(1, Ordering::Relaxed);
        let markets: usize = backfill.markets.iter().map(|recovered| recovered.market_count()).sum();
        info!(
            since = %backfill.since,
            until = %backfill.until,
            matches = backfill.matches.len(),
            markets,
            complete = backfill.complete,
            "backfill"
        );
    }

    fn on_lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Disconnection => warn!("Feed {event}"),
            LifecycleEvent::Reconnection => info!("Feed {event}"),
        }
    }
}
