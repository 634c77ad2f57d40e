use thiserror::Error;

pub type UpliftResult<T> = Result<T, UpliftError>;

#[derive(Error, Debug)]
pub enum UpliftError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Result storage error: {0}")]
    Storage(String),

    #[error("Posterior sampling error: {0}")]
    Sampling(String),

    #[error("Invalid model input: {0}")]
    InvalidInput(String),

    #[error("Variation sets do not match: {0}")]
    VariationMismatch(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
