//! # odds_feed
//!
//! Connection-resilience core of the odds feed client: heartbeat-based failure
//! detection, reconnect with backoff, and the recovery window that buffers live
//! traffic while missed state is backfilled over REST.

pub mod amqp;
pub mod backoff;
pub mod connection;
pub mod dispatch;
pub mod errors;
pub mod handler;
pub mod heartbeat;
pub mod transport;
pub mod window;

#[cfg(test)]
mod testing;

pub use amqp::AmqpBroker;
pub use amqp::BrokerSettings;
pub use backoff::BackoffConfig;
pub use backoff::ReconnectBackoff;
pub use connection::ConnectionConfig;
pub use connection::FeedConnection;
pub use dispatch::Dispatcher;
pub use dispatch::Disposition;
pub use errors::FeedError;
pub use errors::Result;
pub use errors::TransportError;
pub use handler::Backfill;
pub use handler::FeedHandler;
pub use handler::LifecycleEvent;
pub use heartbeat::ConnectivityState;
pub use heartbeat::HeartbeatConfig;
pub use heartbeat::HeartbeatMonitor;
pub use transport::Acknowledger;
pub use transport::Broker;
pub use transport::BrokerSession;
pub use transport::Delivery;
pub use transport::DeliveryStream;
pub use transport::QueueBinding;
pub use transport::ShutdownHook;
pub use window::RecoveryControl;
pub use window::RecoveryWindow;
