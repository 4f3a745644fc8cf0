use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

use futures::future::BoxFuture;
use odds_types::FixtureMatch;
use odds_types::Market;
use odds_types::MarketsRecoveryMatch;
use odds_types::MatchMarketsResponse;
use odds_types::OddsConverter;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::client::HttpClient;
use crate::client::HttpClientConfig;
use crate::errors::HttpError;
use crate::errors::Result;

pub const DEFAULT_API_BASE_URL: &str = "https://api.pandascore.co/betting/matches";

/// Read-only backfill operations used to patch state missed during an outage.
///
/// Every error is recoverable from the caller's point of view.
pub trait RecoveryGateway: Send + Sync {
    /// Markets changed since `since`, grouped by match and game
    fn recover_markets(&self, since: OffsetDateTime) -> BoxFuture<'_, Result<Vec<MarketsRecoveryMatch>>>;

    /// Booked matches modified within `[start, end]`
    fn matches_in_range(&self, start: OffsetDateTime, end: OffsetDateTime) -> BoxFuture<'_, Result<Vec<FixtureMatch>>>;

    fn fetch_match(&self, match_id: u64) -> BoxFuture<'_, Result<FixtureMatch>>;

    /// Markets of every game of a match, flattened
    fn fetch_markets(&self, match_id: u64) -> BoxFuture<'_, Result<Vec<Market>>>;
}

#[derive(Debug, Clone)]
pub struct RecoveryClientConfig {
    pub base_url: String,
    pub api_token: String,
    pub http: HttpClientConfig,
}

impl RecoveryClientConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_token: api_token.into(), http: HttpClientConfig::default() }
    }
}

/// REST client for the recovery and match endpoints
pub struct MatchesClient {
    client: HttpClient,
    base_url: String,
    api_token: String,
    converter: OddsConverter,
    next_request_id: AtomicU64,
}

impl MatchesClient {
    pub fn new(config: RecoveryClientConfig, converter: OddsConverter) -> Result<Self> {
        let client = HttpClient::with_config(config.http)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token,
            converter,
            next_request_id: AtomicU64::new(1),
        })
    }

    pub async fn recover_markets(&self, since: OffsetDateTime) -> Result<Vec<MarketsRecoveryMatch>> {
        let path = format!("/recover_markets/{}", format_timestamp(since)?);
        let mut recovered: Vec<MarketsRecoveryMatch> = self.get_json("recover_markets", &path, &[], Vec::len).await?;

        for entry in &mut recovered {
            self.converter.apply_recovered_match(entry);
        }
        Ok(recovered)
    }

    pub async fn matches_in_range(&self, start: OffsetDateTime, end: OffsetDateTime) -> Result<Vec<FixtureMatch>> {
        let range = format!("{},{}", format_timestamp(start)?, format_timestamp(end)?);
        let query = [("range[modified_at]", range), ("filter[booked]", "true".to_string())];
        self.get_json("matches_in_range", "", &query, Vec::len).await
    }

    pub async fn fetch_match(&self, match_id: u64) -> Result<FixtureMatch> {
        self.get_json("fetch_match", &format!("/{match_id}"), &[], |_| 1).await
    }

    pub async fn fetch_markets(&self, match_id: u64) -> Result<Vec<Market>> {
        let response: MatchMarketsResponse =
            self.get_json("fetch_markets", &format!("/{match_id}/markets"), &[], MatchMarketsResponse::market_count).await?;

        let mut markets = response.into_markets();
        self.converter.apply_markets(&mut markets);
        Ok(markets)
    }

    /// Executes a GET, logs duration and record count, and decodes the JSON body.
    ///
    /// The API token is appended as a query parameter and never logged.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
        count: impl Fn(&T) -> usize,
    ) -> Result<T> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();
        info!(operation, request_id, path = %url, "HTTP GET");

        let result = self.execute::<T>(&url, query).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(body) => info!(operation, request_id, records = count(body), elapsed_ms, "HTTP GET complete"),
            Err(err) => error!(operation, request_id, elapsed_ms, "HTTP GET failed: {err}"),
        }
        result
    }

    async fn execute<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        // reqwest errors render their URL, which carries the token
        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("token", self.api_token.as_str())])
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(HttpError::AuthenticationFailed(format!("HTTP {} from {url}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(HttpError::Status { status: status.as_u16(), path: url.to_string() });
        }

        let bytes = response.bytes().await.map_err(reqwest::Error::without_url)?;
        debug!(bytes = bytes.len(), "HTTP response payload for {url}");
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl RecoveryGateway for MatchesClient {
    fn recover_markets(&self, since: OffsetDateTime) -> BoxFuture<'_, Result<Vec<MarketsRecoveryMatch>>> {
        Box::pin(MatchesClient::recover_markets(self, since))
    }

    fn matches_in_range(&self, start: OffsetDateTime, end: OffsetDateTime) -> BoxFuture<'_, Result<Vec<FixtureMatch>>> {
        Box::pin(MatchesClient::matches_in_range(self, start, end))
    }

    fn fetch_match(&self, match_id: u64) -> BoxFuture<'_, Result<FixtureMatch>> {
        Box::pin(MatchesClient::fetch_match(self, match_id))
    }

    fn fetch_markets(&self, match_id: u64) -> BoxFuture<'_, Result<Vec<Market>>> {
        Box::pin(MatchesClient::fetch_markets(self, match_id))
    }
}

/// RFC 3339 in UTC with whole seconds, e.g. `2025-05-22T14:00:00Z`
pub fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
    let utc = ts.to_offset(UtcOffset::UTC);
    let truncated = utc.replace_nanosecond(0).unwrap_or(utc);
    Ok(truncated.format(&Rfc3339)?)
}

#[cfg(test)]
mod tests {
    use odds_types::OddsFormats;
    use time::macros::datetime;
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;

    /// Serves a single HTTP response and reports the request line it received
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut read = 0;
            loop {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                read += n;
                if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let request = String::from_utf8_lossy(&buf[..read]).to_string();
            let request_line = request.lines().next().unwrap_or_default().to_string();
            let _ = tx.send(request_line);

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        (format!("http://{addr}/betting/matches"), rx)
    }

    fn client(base_url: &str, formats: OddsFormats) -> MatchesClient {
        let mut config = RecoveryClientConfig::new(base_url, "secret-token");
        config.http.hickory_dns = false;
        MatchesClient::new(config, OddsConverter::new(formats)).unwrap()
    }

    #[test]
    fn test_format_timestamp_truncates_to_seconds() {
        let ts = datetime!(2025-05-22 14:00:00.750 UTC);
        assert_eq!(format_timestamp(ts).unwrap(), "2025-05-22T14:00:00Z");
    }

    #[test]
    fn test_format_timestamp_normalises_offset() {
        let ts = datetime!(2025-05-22 16:00:00 +02:00);
        assert_eq!(format_timestamp(ts).unwrap(), "2025-05-22T14:00:00Z");
    }

    #[tokio::test]
    async fn test_recover_markets_converts_odds() {
        let (base, request) =
            serve_once("200 OK", r#"[{"id": 1, "markets": [], "games": [{"id": 2, "markets": [{"id": "m", "selections": [{"id": "s", "odds_decimal": 2.0}]}]}]}]"#)
                .await;
        let client = client(&base, OddsFormats::new(true, true));

        let recovered = client.recover_markets(datetime!(2025-05-22 14:00:00 UTC)).await.unwrap();

        let request_line = request.await.unwrap();
        assert!(request_line.starts_with("GET /betting/matches/recover_markets/2025-05-22T14:00:00Z?token=secret-token"));
        let selection = &recovered[0].games[0].markets[0].selections[0];
        assert_eq!(selection.odds_american, Some(100));
        assert_eq!(selection.odds_fractional.as_deref(), Some("1/1"));
    }

    #[tokio::test]
    async fn test_matches_in_range_query() {
        let (base, request) = serve_once("200 OK", r#"[{"id": 5, "name": "A vs B"}]"#).await;
        let client = client(&base, OddsFormats::none());

        let matches = client.matches_in_range(datetime!(2025-05-22 14:00:00 UTC), datetime!(2025-05-22 14:05:00 UTC)).await.unwrap();

        assert_eq!(matches.len(), 1);
        let request_line = request.await.unwrap();
        assert!(request_line.contains("range%5Bmodified_at%5D=2025-05-22T14%3A00%3A00Z%2C2025-05-22T14%3A05%3A00Z"));
        assert!(request_line.contains("filter%5Bbooked%5D=true"));
    }

    #[tokio::test]
    async fn test_fetch_markets_flattens_games() {
        let (base, _request) = serve_once("200 OK", r#"{"games": [{"markets": [{"id": "a"}]}, {"markets": [{"id": "b"}]}]}"#).await;
        let client = client(&base, OddsFormats::none());

        let markets = client.fetch_markets(77).await.unwrap();
        assert_eq!(markets.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (base, _request) = serve_once("500 Internal Server Error", "{}").await;
        let client = client(&base, OddsFormats::none());

        let err = client.fetch_match(1).await.unwrap_err();
        assert!(matches!(err, HttpError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_error() {
        let (base, _request) = serve_once("401 Unauthorized", "{}").await;
        let client = client(&base, OddsFormats::none());

        let err = client.fetch_match(1).await.unwrap_err();
        assert!(matches!(err, HttpError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let (base, _request) = serve_once("200 OK", "not json").await;
        let client = client(&base, OddsFormats::none());

        let err = client.fetch_match(1).await.unwrap_err();
        assert!(matches!(err, HttpError::JsonError(_)));
    }

    #[tokio::test]
    async fn test_transport_error_hides_token() {
        // nothing listens on port 1
        let client = client("http://127.0.0.1:1/betting/matches", OddsFormats::none());

        let err = client.fetch_match(42).await.unwrap_err();

        assert!(matches!(err, HttpError::RequestFailed(_)));
        assert!(!err.to_string().contains("secret-token"));
        assert!(!format!("{err:?}").contains("secret-token"));
    }
}
