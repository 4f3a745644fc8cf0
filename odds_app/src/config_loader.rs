use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use config::Config;
use config::ConfigBuilder;
use config::Environment;
use config::File;
use config::builder::DefaultState;
use odds_feed::BackoffConfig;
use odds_feed::BrokerSettings;
use odds_feed::ConnectionConfig;
use odds_feed::HeartbeatConfig;
use odds_feed::QueueBinding;
use odds_feed::amqp::DEFAULT_EXCHANGE;
use odds_feed::amqp::DEFAULT_FEED_HOST;
use odds_http::RecoveryClientConfig;
use odds_http::recovery::DEFAULT_API_BASE_URL;
use odds_types::OddsFormats;
use serde::Deserialize;
use tracing::Level;

use crate::errors::Result;
use crate::errors::SettingsError;
use crate::tracing_setup::LogOptions;

/// Prefix of environment overrides, e.g. `ODDS_FEED__API_TOKEN`
pub const ENV_PREFIX: &str = "ODDS_FEED";

/// Settings of a feed client process
#[derive(Clone, Deserialize)]
pub struct FeedSettings {
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub company_id: u64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_feed_host")]
    pub feed_host: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default)]
    pub queue_bindings: Vec<QueueBinding>,
    #[serde(default)]
    pub always_log_payload: bool,
    #[serde(default)]
    pub american_odds: bool,
    #[serde(default)]
    pub fractional_odds: bool,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_reconnect_step_secs")]
    pub reconnect_step_secs: u64,
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
    #[serde(default)]
    pub prefetch: Option<u16>,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_stdout")]
    pub log_stdout: bool,
}

fn default_feed_host() -> String {
    DEFAULT_FEED_HOST.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_exchange() -> String {
    DEFAULT_EXCHANGE.to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    10
}

fn default_reconnect_step_secs() -> u64 {
    5
}

fn default_reconnect_max_secs() -> u64 {
    60
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_stdout() -> bool {
    true
}

/// Loads settings from an optional TOML file plus `ODDS_FEED__*` environment overrides.
///
/// A `.env` file in the working directory is read first when present.
pub fn load_settings<P: AsRef<Path>>(path: Option<P>) -> Result<FeedSettings> {
    if let Ok(env_file) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", env_file.display());
    }

    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path.as_ref()).required(false));
    }
    from_builder(builder.add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__").try_parsing(true)))
}

fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<FeedSettings> {
    let settings: FeedSettings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

impl FeedSettings {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("api_token", &self.api_token),
            ("email", &self.email),
            ("password", &self.password),
            ("feed_host", &self.feed_host),
            ("api_base_url", &self.api_base_url),
            ("exchange", &self.exchange),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(SettingsError::invalid(field, "must not be empty"));
            }
        }

        if self.company_id == 0 {
            return Err(SettingsError::invalid("company_id", "must be greater than zero"));
        }
        if self.queue_bindings.is_empty() {
            return Err(SettingsError::invalid("queue_bindings", "at least one binding is required"));
        }
        for (index, binding) in self.queue_bindings.iter().enumerate() {
            if binding.queue_name.trim().is_empty() || binding.routing_key.trim().is_empty() {
                return Err(SettingsError::invalid("queue_bindings", format!("binding #{index} needs a queue name and a routing key")));
            }
        }

        if self.heartbeat_interval_secs == 0 {
            return Err(SettingsError::invalid("heartbeat_interval_secs", "must be greater than zero"));
        }
        if self.reconnect_step_secs == 0 {
            return Err(SettingsError::invalid("reconnect_step_secs", "must be greater than zero"));
        }
        if self.reconnect_max_secs < self.reconnect_step_secs {
            return Err(SettingsError::invalid("reconnect_max_secs", "must not be below reconnect_step_secs"));
        }
        if self.log_level.parse::<Level>().is_err() {
            return Err(SettingsError::invalid("log_level", format!("unknown level {:?}", self.log_level)));
        }
        Ok(())
    }

    pub fn odds_formats(&self) -> OddsFormats {
        OddsFormats::new(self.american_odds, self.fractional_odds)
    }

    pub fn heartbeat_config(&self) -> HeartbeatConfig {
        HeartbeatConfig { interval: Duration::from_secs(self.heartbeat_interval_secs), ..HeartbeatConfig::default() }
    }

    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig { step: Duration::from_secs(self.reconnect_step_secs), max_delay: Duration::from_secs(self.reconnect_max_secs) }
    }

    pub fn broker_settings(&self) -> BrokerSettings {
        BrokerSettings {
            host: self.feed_host.clone(),
            prefetch: self.prefetch,
            ..BrokerSettings::new(self.company_id, self.email.clone(), self.password.clone())
        }
    }

    pub fn recovery_client_config(&self) -> RecoveryClientConfig {
        RecoveryClientConfig::new(self.api_base_url.clone(), self.api_token.clone())
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            exchange: self.exchange.clone(),
            bindings: self.queue_bindings.clone(),
            heartbeat: self.heartbeat_config(),
            backoff: self.backoff_config(),
            odds: self.odds_formats(),
            always_log_payload: self.always_log_payload,
        }
    }

    pub fn log_options(&self, app_name: &str) -> LogOptions {
        LogOptions {
            app_name: app_name.to_string(),
            log_dir: self.log_dir.clone(),
            default_level: self.log_level.parse().unwrap_or(Level::INFO),
            stdout: self.log_stdout,
        }
    }
}

// credentials stay out of logs
impl fmt::Debug for FeedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSettings")
            .field("company_id", &self.company_id)
            .field("email", &self.email)
            .field("feed_host", &self.feed_host)
            .field("api_base_url", &self.api_base_url)
            .field("exchange", &self.exchange)
            .field("queue_bindings", &self.queue_bindings)
            .field("always_log_payload", &self.always_log_payload)
            .field("american_odds", &self.american_odds)
            .field("fractional_odds", &self.fractional_odds)
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("reconnect_step_secs", &self.reconnect_step_secs)
            .field("reconnect_max_secs", &self.reconnect_max_secs)
            .field("prefetch", &self.prefetch)
            .finish_non_exhaustive()
    }
}
