use serde::Deserialize;
use serde::Serialize;

/// Action carried by a fixture message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureAction {
    Created,
    Booked,
    Unbooked,
    Reviewed,
    Updated,
    Rescheduled,
    Postponed,
    Started,
    Finished,
    Settled,
    CoverageChanged,
    Canceled,
    Deleted,
    /// Legacy action still emitted by the feed
    LiveAvailable,
    #[serde(other)]
    Unknown,
}

/// Top-level `fixture` message from the feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureMessage {
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub at: Option<String>,
    #[serde(default)]
    pub action: Option<FixtureAction>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_id: Option<u64>,
    #[serde(default)]
    pub videogame_slug: Option<String>,
    #[serde(default)]
    pub tournament_tier: Option<String>,
    #[serde(default)]
    pub match_id: Option<u64>,
    #[serde(default)]
    pub game_position: Option<u32>,
    #[serde(rename = "match", default)]
    pub fixture: Option<FixtureMatch>,
    #[serde(default)]
    pub serie: Option<serde_json::Value>,
}

/// Match as returned by the fixture feed and the matches REST endpoints.
///
/// Nested league/serie/tournament/opponent/game objects are kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureMatch {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_games: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serie_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forfeit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescheduled: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opponents: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub games: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
