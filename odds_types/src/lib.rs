//! # odds_types
//!
//! Wire models of the odds feed, envelope decoding and odds-format conversion

pub mod envelope;
pub mod errors;
pub mod fixtures;
pub mod markets;
pub mod odds;

pub use envelope::Envelope;
pub use envelope::FeedMessage;
pub use envelope::HEARTBEAT_TYPE;
pub use envelope::MessageKind;
pub use envelope::Payload;
pub use envelope::RoutingMeta;
pub use envelope::decode;
pub use errors::EnvelopeError;
pub use fixtures::FixtureAction;
pub use fixtures::FixtureMatch;
pub use fixtures::FixtureMessage;
pub use markets::Market;
pub use markets::MarketAction;
pub use markets::MarketsMessage;
pub use markets::MarketsRecoveryGame;
pub use markets::MarketsRecoveryMatch;
pub use markets::MatchMarketsResponse;
pub use markets::Selection;
pub use odds::DerivedOdds;
pub use odds::OddsConverter;
pub use odds::OddsFormats;
