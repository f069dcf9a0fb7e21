//! Encoder-decoder configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Model configuration.
///
/// Relation counts follow the training data layout: the encoder sees every
/// edge twice (forward and inverse, see [`add_inverse_edges`](crate::add_inverse_edges)),
/// so with `inverse_relations` each convolution gets `2 * num_edge_types`
/// relation ids while the decoder keeps one vector per original type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of nodes in the embedding table.
    pub num_nodes: usize,
    /// Number of edge types scored by the decoder.
    pub num_edge_types: usize,
    /// Node embedding width (default: 128).
    pub in_dim: usize,
    /// Output width of the first convolution (default: 64).
    pub hidden_dim: usize,
    /// Output width of the second convolution and of relation vectors (default: 32).
    pub out_dim: usize,
    /// Give inverse edges their own relation ids (default: true).
    #[serde(default = "default_true")]
    pub inverse_relations: bool,
    /// Above this many edge types, switch to block-diagonal transforms (default: 20).
    #[serde(default = "default_block_threshold")]
    pub block_threshold: usize,
    /// Blocks used once `block_threshold` is exceeded (default: 4).
    #[serde(default = "default_num_blocks")]
    pub num_blocks: usize,
}

fn default_true() -> bool {
    true
}

fn default_block_threshold() -> usize {
    20
}

fn default_num_blocks() -> usize {
    4
}

impl ModelConfig {
    pub fn new(num_nodes: usize, num_edge_types: usize) -> Self {
        Self {
            num_nodes,
            num_edge_types,
            in_dim: 128,
            hidden_dim: 64,
            out_dim: 32,
            inverse_relations: default_true(),
            block_threshold: default_block_threshold(),
            num_blocks: default_num_blocks(),
        }
    }

    pub fn with_dims(mut self, in_dim: usize, hidden_dim: usize, out_dim: usize) -> Self {
        self.in_dim = in_dim;
        self.hidden_dim = hidden_dim;
        self.out_dim = out_dim;
        self
    }

    pub fn with_inverse_relations(mut self, inverse_relations: bool) -> Self {
        self.inverse_relations = inverse_relations;
        self
    }

    pub fn with_block_threshold(mut self, block_threshold: usize) -> Self {
        self.block_threshold = block_threshold;
        self
    }

    pub fn with_num_blocks(mut self, num_blocks: usize) -> Self {
        self.num_blocks = num_blocks;
        self
    }

    /// Relation ids each convolution must accept.
    pub fn num_relations(&self) -> usize {
        if self.inverse_relations {
            2 * self.num_edge_types
        } else {
            self.num_edge_types
        }
    }

    /// Block count for the convolutions, if block-diagonal transforms are used.
    pub fn blocks(&self) -> Option<usize> {
        (self.num_edge_types > self.block_threshold).then_some(self.num_blocks)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_nodes == 0 || self.num_edge_types == 0 {
            return Err(Error::Validation(
                "num_nodes and num_edge_types must be positive".to_string(),
            ));
        }
        if self.in_dim == 0 || self.hidden_dim == 0 || self.out_dim == 0 {
            return Err(Error::Validation("embedding widths must be positive".to_string()));
        }
        Ok(())
    }
}
