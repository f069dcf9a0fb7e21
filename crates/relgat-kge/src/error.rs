use thiserror::Error;

/// Errors that can occur in relgat-kge.
#[derive(Error, Debug)]
pub enum Error {
    /// Attention layer error (construction or forward).
    #[error("layer error: {0}")]
    Layer(#[from] relgat_nn::Error),
    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Inputs that do not fit the model (relation ids, embedding widths).
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for relgat-kge.
pub type Result<T> = std::result::Result<T, Error>;
