use std::sync::Arc;

use odds_app::cli;
use odds_app::config_loader;
use odds_app::console::ConsoleHandler;
use odds_app::shutdown_handler;
use odds_app::tracing_setup;
use odds_feed::AmqpBroker;
use odds_feed::FeedConnection;
use odds_http::MatchesClient;
use odds_types::OddsConverter;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = cli::config_path();
    let settings = config_loader::load_settings(Some(&config_path))?;

    // CRITICAL: Keep guard alive for entire application lifetime
    let _guard = tracing_setup::init(&settings.log_options("feed_console"))?;
    info!(config = %config_path.display(), settings = ?settings, "Starting feed console");

    let shutdown = shutdown_handler::install()?;

    let gateway = Arc::new(MatchesClient::new(settings.recovery_client_config(), OddsConverter::new(settings.odds_formats()))?);
    let broker = Arc::new(AmqpBroker::new(settings.broker_settings()));
    let handler = Arc::new(ConsoleHandler::default());
    let feed = FeedConnection::new(settings.connection_config(), broker, gateway, handler.clone());

    feed.connect().await;
    shutdown.wait().await;

    feed.shutdown().await;
    info!(messages = handler.messages(), backfills = handler.backfills(), "Feed console stopped");
    Ok(())
}
