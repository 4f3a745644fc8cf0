//! One-shot check of the recovery endpoints: `recovery_probe [config] [match_id]`

use std::time::Duration;

use anyhow::Context;
use odds_app::cli;
use odds_app::config_loader;
use odds_app::tracing_setup;
use odds_http::MatchesClient;
use odds_http::RecoveryGateway;
use odds_types::OddsConverter;
use time::OffsetDateTime;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = cli::config_path_from(&args);
    let settings = config_loader::load_settings(Some(&config_path))?;
    let _guard = tracing_setup::init(&settings.log_options("recovery_probe"))?;

    let client = MatchesClient::new(settings.recovery_client_config(), OddsConverter::new(settings.odds_formats()))?;
    let gateway: &dyn RecoveryGateway = &client;

    let until = OffsetDateTime::now_utc();
    let since = until - Duration::from_secs(15 * 60);

    let recovered = gateway.recover_markets(since).await.context("recover_markets")?;
    info!(matches = recovered.len(), markets = recovered.iter().map(|m| m.market_count()).sum::<usize>(), "Markets changed in the last 15 minutes");

    let matches = gateway.matches_in_range(since, until).await.context("matches_in_range")?;
    info!(matches = matches.len(), "Booked matches modified in the last 15 minutes");

    let Some(match_id) = cli::match_id_from(&args, 2).or_else(|| matches.first().map(|m| m.id)) else {
        info!("No match to inspect");
        return Ok(());
    };

    let fixture = gateway.fetch_match(match_id).await.context("fetch_match")?;
    let markets = gateway.fetch_markets(match_id).await.context("fetch_markets")?;
    info!(match_id, name = fixture.name.as_deref().unwrap_or("-"), status = fixture.status.as_deref().unwrap_or("-"), markets = markets.len(), "Match");
    Ok(())
}
