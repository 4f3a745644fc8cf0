use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;

/// Action carried by a markets message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketAction {
    Created,
    MarginChanged,
    OddsChanged,
    Suspended,
    Deactivated,
    Settled,
    RollbackSettlement,
    OpponentUpdated,
    PartiallySettled,
    #[serde(other)]
    Unknown,
}

/// Top-level `markets` message from the feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketsMessage {
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub at: Option<String>,
    #[serde(default)]
    pub action: Option<MarketAction>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_id: Option<u64>,
    #[serde(default)]
    pub videogame_slug: Option<String>,
    #[serde(default)]
    pub match_id: Option<u64>,
    #[serde(default)]
    pub tournament_tier: Option<String>,
    #[serde(default)]
    pub game_position: Option<u32>,
    #[serde(default)]
    pub markets: Vec<Market>,
}

/// A single market and its selections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Market {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_side: Option<String>,
    /// Bookmaker margin baked into the overround prices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overround: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_deactivated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handicap_home: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handicap_away: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_line_grouping_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
    #[serde(default)]
    pub selections: Vec<Selection>,
    /// Game-specific indices (drake, tower, quarter, ...) kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One selection of a market with its price set.
///
/// `odds_american*` and `odds_fractional*` are derived from the decimal prices by
/// [`crate::OddsConverter`] and are never merged with earlier values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_side: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handicap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_with_overround: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_with_margin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_decimal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_decimal_with_overround: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_decimal_with_margin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_american: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_american_with_overround: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_fractional: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_fractional_with_overround: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Ids arrive as strings, numbers or null depending on the producer
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => id,
        Value::Number(id) => id.to_string(),
        _ => String::new(),
    })
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Element returned by the markets recovery endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketsRecoveryMatch {
    pub id: u64,
    #[serde(default)]
    pub markets: Vec<Market>,
    #[serde(default)]
    pub games: Vec<MarketsRecoveryGame>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketsRecoveryGame {
    pub id: u64,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub markets: Vec<Market>,
}

impl MarketsRecoveryMatch {
    /// Total number of markets across the match and its games
    pub fn market_count(&self) -> usize {
        self.markets.len() + self.games.iter().map(|game| game.markets.len()).sum::<usize>()
    }
}

/// Body of the per-match markets endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchMarketsResponse {
    #[serde(default)]
    pub games: Vec<GameMarkets>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameMarkets {
    #[serde(default)]
    pub markets: Vec<Market>,
}

impl MatchMarketsResponse {
    pub fn market_count(&self) -> usize {
        self.games.iter().map(|game| game.markets.len()).sum()
    }

    pub fn into_markets(self) -> Vec<Market> {
        self.games.into_iter().flat_map(|game| game.markets).collect()
    }
}
