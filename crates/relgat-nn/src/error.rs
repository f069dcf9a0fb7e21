//! Error types for relgat-nn.

use thiserror::Error;

/// Layer error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Invalid combination of layer options, raised at construction.
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    /// Runtime shape or divisibility mismatch.
    #[error("shape error: {0}")]
    Shape(String),

    /// Input of the wrong element kind (e.g. integer features where floats are required).
    #[error("type error: {0}")]
    Type(String),
}

/// One variant per construction rule, so callers can tell them apart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("attention mechanism must either be \"within-relation\" or \"across-relation\", got {0:?}")]
    UnknownAttentionScope(String),

    #[error(
        "attention mode must either be \"additive-self-attention\" or \
         \"multiplicative-self-attention\", got {0:?}"
    )]
    UnknownAttentionScore(String),

    #[error(
        "mod must be one of \"additive\", \"scaled\", \"f-additive\", \"f-scaled\" \
         (or none), got {0:?}"
    )]
    UnknownModulation(String),

    #[error(
        "\"additive-self-attention\" mode cannot be applied when dim is greater than 1 \
         (dim = {0}); use \"multiplicative-self-attention\" instead"
    )]
    AdditiveScoreDim(usize),

    #[error(
        "mod must be none with dropout greater than 0 (dropout = {dropout}, mod = {modulation}) \
         in order to sample attention coefficients stochastically"
    )]
    DropoutWithModulation { dropout: f32, modulation: String },

    #[error("cannot apply both basis-decomposition and block-diagonal-decomposition at the same time")]
    BasisAndBlocks,

    #[error("heads must be at least 1")]
    ZeroHeads,

    #[error("dim must be at least 1")]
    ZeroDim,

    #[error("num_relations must be at least 1")]
    ZeroRelations,

    #[error("dropout must lie in [0, 1), got {0}")]
    DropoutRange(f32),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
