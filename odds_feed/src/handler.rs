use std::fmt;

use odds_types::FeedMessage;
use odds_types::FixtureMatch;
use odds_types::MarketsRecoveryMatch;
use time::OffsetDateTime;

/// Connectivity notifications delivered to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Disconnection,
    Reconnection,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Disconnection => "disconnection",
            LifecycleEvent::Reconnection => "reconnection",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State fetched over REST for one outage window
#[derive(Debug, Clone, PartialEq)]
pub struct Backfill {
    pub since: OffsetDateTime,
    pub until: OffsetDateTime,
    pub markets: Vec<MarketsRecoveryMatch>,
    pub matches: Vec<FixtureMatch>,
    /// False when at least one recovery call failed
    pub complete: bool,
}

/// Application boundary of the feed.
///
/// `on_message` runs on the delivery path: an error on a live message asks the
/// broker for redelivery, an error on a message replayed from the recovery
/// window is logged and the message is dropped.
pub trait FeedHandler: Send + Sync + 'static {
    fn on_message(&self, message: &FeedMessage) -> anyhow::Result<()>;

    /// Called with the backfill results before buffered live messages are replayed
    fn on_backfill(&self, _backfill: &Backfill) {}

    fn on_lifecycle(&self, _event: LifecycleEvent) {}
}
