//! Relation-specific linear transforms.
//!
//! Each relation `r` owns a map `W_r: in_channels -> heads * out_channels`.
//! With many relations the full stack of matrices gets large, so two
//! factorizations are offered (Schlichtkrull et al., 2018):
//!
//! | Variant | Parameters | Shape |
//! |---------|------------|-------|
//! | [`Full`](RelationTransform::Full) | `R·in·out` | `(R, in, out)` |
//! | [`Basis`](RelationTransform::Basis) | `B·in·out + R·B` | `(B, in, out)` + `(R, B)` |
//! | [`BlockDiagonal`](RelationTransform::BlockDiagonal) | `R·in·out / B` | `(R, B, in/B, out/B)` |
//!
//! ```text
//! basis:  W_r = Σ_b a_{rb} V_b
//! block:  W_r = diag(Q_r^1, ..., Q_r^B)
//! ```

use candle_core::Tensor;
use candle_nn::VarBuilder;

use crate::config::{check_block_divisibility, RGATConfig};
use crate::error::{Error, Result};
use crate::init::glorot;

/// The relation transform of one layer, chosen once at construction.
#[derive(Debug, Clone)]
pub enum RelationTransform {
    /// One dense matrix per relation: `(num_relations, in_channels, width)`.
    Full { weight: Tensor },
    /// Shared bases `(num_bases, in_channels, width)` mixed by
    /// per-relation coefficients `(num_relations, num_bases)`.
    Basis { basis: Tensor, coeffs: Tensor },
    /// Block-diagonal matrices `(num_relations, num_blocks, in/num_blocks, width/num_blocks)`.
    BlockDiagonal { weight: Tensor },
}

impl RelationTransform {
    /// Allocate the variant selected by `num_bases` / `num_blocks`.
    pub fn new(config: &RGATConfig, vb: &VarBuilder) -> Result<Self> {
        let r = config.num_relations;
        let in_c = config.in_channels;
        let width = config.hidden_width();

        match (config.num_bases, config.num_blocks) {
            (Some(b), None) => {
                let basis = vb.get_with_hints((b, in_c, width), "basis", glorot(in_c, width))?;
                let coeffs = vb.get_with_hints((r, b), "att", glorot(r, b))?;
                Ok(Self::Basis { basis, coeffs })
            }
            (None, Some(b)) => {
                check_block_divisibility(in_c, width, b)?;
                let (in_b, out_b) = (in_c / b, width / b);
                let weight = vb.get_with_hints((r, b, in_b, out_b), "weight", glorot(in_b, out_b))?;
                Ok(Self::BlockDiagonal { weight })
            }
            (None, None) => {
                let weight = vb.get_with_hints((r, in_c, width), "weight", glorot(in_c, width))?;
                Ok(Self::Full { weight })
            }
            (Some(_), Some(_)) => Err(crate::error::ConfigError::BasisAndBlocks.into()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Full { .. } => "full",
            Self::Basis { .. } => "basis",
            Self::BlockDiagonal { .. } => "block-diagonal",
        }
    }

    /// The per-relation weight tensor.
    ///
    /// Full and basis modes return the dense `(num_relations, in_channels, width)`
    /// stack (basis mode materializes `Σ_b a_{rb} V_b`); block mode returns its
    /// block tensor unchanged.
    pub fn relation_weights(&self) -> Result<Tensor> {
        match self {
            Self::Full { weight } | Self::BlockDiagonal { weight } => Ok(weight.clone()),
            Self::Basis { basis, coeffs } => {
                let (num_bases, in_c, width) = basis.dims3()?;
                let num_relations = coeffs.dim(0)?;
                let flat = basis.reshape((num_bases, in_c * width))?;
                Ok(coeffs.matmul(&flat)?.reshape((num_relations, in_c, width))?)
            }
        }
    }

    /// Transform target-side and source-side rows by their edge's relation.
    ///
    /// `x_i` and `x_j` are `(E, in_channels)`; both outputs are `(E, width)`.
    pub fn apply(&self, x_i: &Tensor, x_j: &Tensor, edge_type: &Tensor) -> Result<(Tensor, Tensor)> {
        match self {
            Self::BlockDiagonal { weight } => {
                if !x_i.dtype().is_float() || !x_j.dtype().is_float() {
                    return Err(Error::Type(
                        "block-diagonal decomposition not supported for non-continuous input features"
                            .to_string(),
                    ));
                }
                let (_, num_blocks, in_b, out_b) = weight.dims4()?;
                let in_c = x_i.dim(1)?;
                check_block_divisibility(in_c, num_blocks * out_b, num_blocks)?;
                if in_c != num_blocks * in_b {
                    return Err(Error::Shape(format!(
                        "features have width {in_c}, block weights expect {}",
                        num_blocks * in_b
                    )));
                }
                let w = weight.index_select(edge_type, 0)?;
                let project = |x: &Tensor| -> Result<Tensor> {
                    let e = x.dim(0)?;
                    // (E, B, 1, in/B) x (E, B, in/B, out/B) -> (E, B, 1, out/B)
                    let blocks = x.reshape((e, num_blocks, 1, in_b))?.matmul(&w)?;
                    Ok(blocks.reshape((e, num_blocks * out_b))?)
                };
                Ok((project(x_i)?, project(x_j)?))
            }
            Self::Full { .. } | Self::Basis { .. } => {
                let weights = self.relation_weights()?;
                let (_, in_c, _) = weights.dims3()?;
                if x_i.dim(1)? != in_c {
                    return Err(Error::Shape(format!(
                        "features have width {}, relation transform expects {in_c}",
                        x_i.dim(1)?
                    )));
                }
                let w = weights.index_select(edge_type, 0)?;
                // (E, 1, in) x (E, in, width) -> (E, 1, width)
                let project =
                    |x: &Tensor| -> Result<Tensor> { Ok(x.unsqueeze(1)?.matmul(&w)?.squeeze(1)?) };
                Ok((project(x_i)?, project(x_j)?))
            }
        }
    }
}
