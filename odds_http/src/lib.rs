//! REST access to the recovery (backfill) endpoints of the odds feed.

pub mod client;
pub mod errors;
pub mod recovery;

pub use client::HttpClient;
pub use client::HttpClientConfig;
pub use errors::HttpError;
pub use errors::Result;
pub use recovery::MatchesClient;
pub use recovery::RecoveryClientConfig;
pub use recovery::RecoveryGateway;
pub use recovery::format_timestamp;
