use thiserror::Error;

/// Failures raised by a broker transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Transport closed: {0}")]
    Closed(String),

    #[error("Transport operation failed: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Feed connection is shutting down")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, FeedError>;
