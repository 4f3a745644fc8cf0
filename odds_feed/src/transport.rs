//! Broker abstraction consumed by [`crate::FeedConnection`].
//!
//! The AMQP implementation lives in [`crate::amqp`]; tests drive the connection
//! through in-memory implementations of the same traits.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde::Serialize;

use crate::errors::TransportError;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// One subscription: a queue bound to the exchange with a routing pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueBinding {
    pub queue_name: String,
    pub routing_key: String,
}

impl QueueBinding {
    pub fn new(queue_name: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self { queue_name: queue_name.into(), routing_key: routing_key.into() }
    }

    pub fn consumer_tag(&self) -> String {
        format!("{}_consumer", self.queue_name)
    }
}

/// Called once with a reason when the session closes underneath us
pub type ShutdownHook = Box<dyn FnOnce(String) + Send + 'static>;

pub type DeliveryStream = BoxStream<'static, TransportResult<Delivery>>;

/// Settles a single delivery with the broker
pub trait Acknowledger: Send + Sync {
    fn ack(&self) -> BoxFuture<'_, TransportResult<()>>;

    fn nack(&self, requeue: bool) -> BoxFuture<'_, TransportResult<()>>;
}

pub struct Delivery {
    pub routing_key: String,
    pub body: Bytes,
    pub acker: Box<dyn Acknowledger>,
}

/// Opens sessions against a broker
pub trait Broker: Send + Sync {
    fn open(&self) -> BoxFuture<'_, TransportResult<Box<dyn BrokerSession>>>;
}

/// A live broker connection with its channel
pub trait BrokerSession: Send + Sync {
    /// Declares the durable topic exchange
    fn declare_exchange<'a>(&'a self, exchange: &'a str) -> BoxFuture<'a, TransportResult<()>>;

    /// Declares the durable queue and binds it to the exchange
    fn declare_binding<'a>(&'a self, exchange: &'a str, binding: &'a QueueBinding) -> BoxFuture<'a, TransportResult<()>>;

    fn on_shutdown(&self, hook: ShutdownHook);

    /// Starts a manual-acknowledge consumer on the queue
    fn consume<'a>(&'a self, queue: &'a str, consumer_tag: &'a str) -> BoxFuture<'a, TransportResult<DeliveryStream>>;

    fn close(&self) -> BoxFuture<'_, TransportResult<()>>;
}
