use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::errors::EnvelopeError;
use crate::errors::Result;
use crate::fixtures::FixtureMessage;
use crate::markets::MarketsMessage;
use crate::odds::OddsConverter;

/// Type tag of the feed health-check message
pub const HEARTBEAT_TYPE: &str = "v1.beat";

/// Classification of an inbound message by its type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Heartbeat,
    Markets,
    Fixture,
    Scoreboard,
    Other,
}

impl MessageKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            HEARTBEAT_TYPE => MessageKind::Heartbeat,
            "markets" => MessageKind::Markets,
            "fixture" => MessageKind::Fixture,
            "scoreboard" => MessageKind::Scoreboard,
            _ => MessageKind::Other,
        }
    }
}

/// Event metadata carried in the routing key.
///
/// Keys look like `<prefix>.<event_type>.<event_id>.<segment>.<action>`; only the
/// segments counted from the end are significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingMeta {
    pub event_type: String,
    pub event_id: String,
    pub action: String,
}

impl RoutingMeta {
    /// Keys with fewer than four segments yield empty metadata
    pub fn from_routing_key(routing_key: &str) -> Self {
        let parts: Vec<&str> = routing_key.split('.').collect();
        let len = parts.len();
        if len < 4 {
            return Self::default();
        }

        Self { event_type: parts[len - 4].to_string(), event_id: parts[len - 3].to_string(), action: parts[len - 1].to_string() }
    }

    pub fn is_empty(&self) -> bool {
        self.event_type.is_empty() && self.event_id.is_empty() && self.action.is_empty()
    }
}

/// Decoded body of a business message
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Markets message with derived odds already applied to every selection
    Markets(MarketsMessage),
    Fixture(FixtureMessage),
    /// Scoreboards, unknown kinds, and typed kinds that did not match their schema
    Raw(Value),
}

/// A business message as handed to the application
#[derive(Debug, Clone, PartialEq)]
pub struct FeedMessage {
    pub message_type: String,
    pub kind: MessageKind,
    pub routing_key: String,
    pub meta: RoutingMeta,
    pub payload: Payload,
}

impl FeedMessage {
    pub fn markets(&self) -> Option<&MarketsMessage> {
        match &self.payload {
            Payload::Markets(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn fixture(&self) -> Option<&FixtureMessage> {
        match &self.payload {
            Payload::Fixture(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Result of decoding one delivery
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Heartbeat,
    Business(FeedMessage),
}

/// Decode a raw delivery body and apply odds conversion to market selections.
///
/// The type tag is the JSON `type` field, or the routing key when absent.
pub fn decode(routing_key: &str, body: &[u8], converter: &OddsConverter) -> Result<Envelope> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(EnvelopeError::NotAnObject);
    }

    let message_type = value.get("type").and_then(Value::as_str).unwrap_or(routing_key).to_string();
    let kind = MessageKind::from_tag(&message_type);
    if kind == MessageKind::Heartbeat {
        return Ok(Envelope::Heartbeat);
    }

    let payload = match kind {
        MessageKind::Markets => match MarketsMessage::deserialize(&value) {
            Ok(mut msg) => {
                converter.apply_markets(&mut msg.markets);
                Payload::Markets(msg)
            }
            Err(err) => {
                warn!(routing_key, "Markets message kept raw, odds not converted: {err}");
                Payload::Raw(value)
            }
        },
        MessageKind::Fixture => match FixtureMessage::deserialize(&value) {
            Ok(msg) => Payload::Fixture(msg),
            Err(err) => {
                warn!(routing_key, "Fixture message kept raw: {err}");
                Payload::Raw(value)
            }
        },
        _ => Payload::Raw(value),
    };

    Ok(Envelope::Business(FeedMessage {
        message_type,
        kind,
        routing_key: routing_key.to_string(),
        meta: RoutingMeta::from_routing_key(routing_key),
        payload,
    }))
}
