//! # odds_app
//!
//! Settings, logging and process plumbing shared by the feed binaries

pub mod cli;
pub mod config_loader;
pub mod console;
pub mod errors;
pub mod shutdown_handler;
pub mod tracing_setup;

pub use config_loader::FeedSettings;
pub use errors::SettingsError;
