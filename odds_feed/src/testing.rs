//! Fakes shared by the unit tests of this crate.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use futures::future::BoxFuture;
use odds_http::HttpError;
use odds_http::RecoveryGateway;
use odds_types::FeedMessage;
use odds_types::FixtureMatch;
use odds_types::Market;
use odds_types::MarketsRecoveryMatch;
use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::handler::Backfill;
use crate::handler::FeedHandler;
use crate::handler::LifecycleEvent;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Message(String),
    Backfill { markets: usize, matches: usize, complete: bool },
    Lifecycle(LifecycleEvent),
}

#[derive(Default)]
pub(crate) struct RecordingHandler {
    events: Mutex<Vec<Event>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events.lock().iter().filter(|seen| *seen == event).count()
    }

    pub fn fail_on(&self, message_type: &str) {
        self.failing.lock().insert(message_type.to_string());
    }
}

impl FeedHandler for RecordingHandler {
    fn on_message(&self, message: &FeedMessage) -> anyhow::Result<()> {
        if self.failing.lock().contains(&message.message_type) {
            bail!("sink unavailable for {}", message.message_type);
        }
        self.events.lock().push(Event::Message(message.message_type.clone()));
        Ok(())
    }

    fn on_backfill(&self, backfill: &Backfill) {
        self.events.lock().push(Event::Backfill {
            markets: backfill.markets.len(),
            matches: backfill.matches.len(),
            complete: backfill.complete,
        });
    }

    fn on_lifecycle(&self, event: LifecycleEvent) {
        self.events.lock().push(Event::Lifecycle(event));
    }
}

#[derive(Default)]
pub(crate) struct StubGateway {
    pub recover_calls: AtomicUsize,
    pub range_calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Duration,
    pub since: Mutex<Option<OffsetDateTime>>,
}

impl StubGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay, ..Default::default() })
    }

    async fn respond<T>(&self, path: &str, value: T) -> odds_http::Result<T> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(HttpError::Status { status: 503, path: path.to_string() });
        }
        Ok(value)
    }
}

impl RecoveryGateway for StubGateway {
    fn recover_markets(&self, since: OffsetDateTime) -> BoxFuture<'_, odds_http::Result<Vec<MarketsRecoveryMatch>>> {
        self.recover_calls.fetch_add(1, Ordering::SeqCst);
        *self.since.lock() = Some(since);
        Box::pin(self.respond("/recover_markets", vec![MarketsRecoveryMatch { id: 1, ..Default::default() }]))
    }

    fn matches_in_range(&self, _start: OffsetDateTime, _end: OffsetDateTime) -> BoxFuture<'_, odds_http::Result<Vec<FixtureMatch>>> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(self.respond("/matches", vec![FixtureMatch { id: 7, ..Default::default() }]))
    }

    fn fetch_match(&self, match_id: u64) -> BoxFuture<'_, odds_http::Result<FixtureMatch>> {
        Box::pin(self.respond("/match", FixtureMatch { id: match_id, ..Default::default() }))
    }

    fn fetch_markets(&self, _match_id: u64) -> BoxFuture<'_, odds_http::Result<Vec<Market>>> {
        Box::pin(self.respond("/markets", Vec::new()))
    }
}

/// Yields to the runtime until `cond` holds
pub(crate) async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
