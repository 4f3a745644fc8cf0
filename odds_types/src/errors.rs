use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message body is not a JSON object")]
    NotAnObject,
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
