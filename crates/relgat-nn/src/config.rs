//! Configuration for [`RGATConv`](crate::RGATConv).
//!
//! The option enums parse from (and serialize to) the same names the
//! reference PyG layer accepts, so configs written for one read in the other:
//!
//! | Option | Values |
//! |--------|--------|
//! | scope | `"within-relation"`, `"across-relation"` |
//! | score | `"additive-self-attention"`, `"multiplicative-self-attention"` |
//! | modulation | `"none"`, `"additive"`, `"scaled"`, `"f-additive"`, `"f-scaled"` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};

/// Which edges compete in the attention softmax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttentionScope {
    /// Normalize separately for each (target node, relation) pair.
    WithinRelation,
    /// Normalize over every edge into a target node, regardless of relation.
    #[default]
    AcrossRelation,
}

impl AttentionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WithinRelation => "within-relation",
            Self::AcrossRelation => "across-relation",
        }
    }
}

impl FromStr for AttentionScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "within-relation" => Ok(Self::WithinRelation),
            "across-relation" => Ok(Self::AcrossRelation),
            other => Err(ConfigError::UnknownAttentionScope(other.to_string())),
        }
    }
}

impl fmt::Display for AttentionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the raw attention logit is formed from the query/key projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttentionScore {
    /// `leaky_relu(q_i + k_j)`: one scalar per edge and head (`dim` must be 1).
    #[default]
    #[serde(rename = "additive-self-attention", alias = "additive")]
    Additive,
    /// `q_i * k_j` elementwise: a `dim`-vector per edge and head.
    #[serde(rename = "multiplicative-self-attention", alias = "multiplicative")]
    Multiplicative,
}

impl AttentionScore {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Additive => "additive-self-attention",
            Self::Multiplicative => "multiplicative-self-attention",
        }
    }
}

impl FromStr for AttentionScore {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "additive-self-attention" | "additive" => Ok(Self::Additive),
            "multiplicative-self-attention" | "multiplicative" => Ok(Self::Multiplicative),
            other => Err(ConfigError::UnknownAttentionScore(other.to_string())),
        }
    }
}

impl fmt::Display for AttentionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-normalization adjustment of attention coefficients or messages.
///
/// | Mode | Effect |
/// |------|--------|
/// | `None` | Stochastic coefficient dropout while training (if `dropout > 0`) |
/// | `Additive` | `out_j * alpha + w * out_j` |
/// | `Scaled` | `out_j * alpha * MLP(in_degree)` |
/// | `FAdditive` | `alpha + 1` where `alpha > 0` |
/// | `FScaled` | `alpha * in_degree` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Modulation {
    #[default]
    None,
    Additive,
    Scaled,
    FAdditive,
    FScaled,
}

impl Modulation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Additive => "additive",
            Self::Scaled => "scaled",
            Self::FAdditive => "f-additive",
            Self::FScaled => "f-scaled",
        }
    }
}

impl FromStr for Modulation {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Self::None),
            "additive" => Ok(Self::Additive),
            "scaled" => Ok(Self::Scaled),
            "f-additive" => Ok(Self::FAdditive),
            "f-scaled" => Ok(Self::FScaled),
            other => Err(ConfigError::UnknownModulation(other.to_string())),
        }
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relational graph attention layer configuration.
///
/// # Example
///
/// ```rust
/// use relgat_nn::{AttentionScope, RGATConfig};
///
/// let config = RGATConfig::new(16, 8, 4)
///     .with_heads(2)
///     .with_num_bases(2)
///     .with_attention_scope(AttentionScope::WithinRelation);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RGATConfig {
    /// Input feature width.
    pub in_channels: usize,
    /// Output width per head.
    pub out_channels: usize,
    /// Number of relation ids; edge types must lie in `[0, num_relations)`.
    pub num_relations: usize,
    /// Basis-decomposition size (exclusive with `num_blocks`).
    pub num_bases: Option<usize>,
    /// Block-diagonal block count (exclusive with `num_bases`).
    pub num_blocks: Option<usize>,
    #[serde(default)]
    pub modulation: Modulation,
    #[serde(default)]
    pub attention_scope: AttentionScope,
    #[serde(default)]
    pub attention_score: AttentionScore,
    /// Number of attention heads (default: 1).
    pub heads: usize,
    /// Width of the attention vector per head (default: 1).
    pub dim: usize,
    /// Concatenate heads (true) or average them (false).
    pub concat: bool,
    /// LeakyReLU slope for the additive score (default: 0.2).
    pub negative_slope: f64,
    /// Coefficient dropout probability while training (default: 0.0).
    pub dropout: f32,
    /// Edge attribute width; required when edge attributes are passed.
    pub edge_dim: Option<usize>,
    /// Add a learned output bias (default: true).
    pub bias: bool,
}

impl RGATConfig {
    pub fn new(in_channels: usize, out_channels: usize, num_relations: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            num_relations,
            num_bases: None,
            num_blocks: None,
            modulation: Modulation::None,
            attention_scope: AttentionScope::AcrossRelation,
            attention_score: AttentionScore::Additive,
            heads: 1,
            dim: 1,
            concat: true,
            negative_slope: 0.2,
            dropout: 0.0,
            edge_dim: None,
            bias: true,
        }
    }

    pub fn with_num_bases(mut self, num_bases: usize) -> Self {
        self.num_bases = Some(num_bases);
        self
    }

    pub fn with_num_blocks(mut self, num_blocks: usize) -> Self {
        self.num_blocks = Some(num_blocks);
        self
    }

    pub fn with_modulation(mut self, modulation: Modulation) -> Self {
        self.modulation = modulation;
        self
    }

    pub fn with_attention_scope(mut self, scope: AttentionScope) -> Self {
        self.attention_scope = scope;
        self
    }

    pub fn with_attention_score(mut self, score: AttentionScore) -> Self {
        self.attention_score = score;
        self
    }

    pub fn with_heads(mut self, heads: usize) -> Self {
        self.heads = heads;
        self
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    pub fn with_concat(mut self, concat: bool) -> Self {
        self.concat = concat;
        self
    }

    pub fn with_negative_slope(mut self, negative_slope: f64) -> Self {
        self.negative_slope = negative_slope;
        self
    }

    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_edge_dim(mut self, edge_dim: usize) -> Self {
        self.edge_dim = Some(edge_dim);
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// `heads * out_channels`, the width of the relation transform output.
    pub fn hidden_width(&self) -> usize {
        self.heads * self.out_channels
    }

    /// Width of one node row in the layer output.
    pub fn output_width(&self) -> usize {
        if self.concat {
            self.heads * self.dim * self.out_channels
        } else {
            self.dim * self.out_channels
        }
    }

    /// Check every construction rule.
    ///
    /// Option conflicts are [`Error::Config`]; block-diagonal widths that
    /// do not divide evenly are [`Error::Shape`].
    pub fn validate(&self) -> Result<()> {
        if self.heads == 0 {
            return Err(ConfigError::ZeroHeads.into());
        }
        if self.dim == 0 {
            return Err(ConfigError::ZeroDim.into());
        }
        if self.num_relations == 0 {
            return Err(ConfigError::ZeroRelations.into());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ConfigError::DropoutRange(self.dropout).into());
        }
        if self.attention_score == AttentionScore::Additive && self.dim > 1 {
            return Err(ConfigError::AdditiveScoreDim(self.dim).into());
        }
        if self.dropout > 0.0 && self.modulation != Modulation::None {
            return Err(ConfigError::DropoutWithModulation {
                dropout: self.dropout,
                modulation: self.modulation.to_string(),
            }
            .into());
        }
        if self.num_bases.is_some() && self.num_blocks.is_some() {
            return Err(ConfigError::BasisAndBlocks.into());
        }
        if let Some(num_blocks) = self.num_blocks {
            check_block_divisibility(self.in_channels, self.hidden_width(), num_blocks)?;
        }
        Ok(())
    }
}

/// Both `in_channels` and `heads * out_channels` must split into `num_blocks` equal blocks.
pub(crate) fn check_block_divisibility(
    in_channels: usize,
    hidden_width: usize,
    num_blocks: usize,
) -> Result<()> {
    if num_blocks == 0 || in_channels % num_blocks != 0 || hidden_width % num_blocks != 0 {
        return Err(Error::Shape(format!(
            "both 'in_channels' ({in_channels}) and 'heads * out_channels' ({hidden_width}) \
             must be multiples of 'num_blocks' ({num_blocks})"
        )));
    }
    Ok(())
}
