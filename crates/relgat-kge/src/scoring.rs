//! DistMult triple scoring.
//!
//! DistMult ([Yang et al. 2015](https://arxiv.org/abs/1412.6575)) treats
//! each relation as a diagonal bilinear form:
//!
//! ```text
//! score(h, r, t) = Σᵢ hᵢ × rᵢ × tᵢ
//! ```
//!
//! **Limitation**: Symmetric by construction, so (h, r, t) and (t, r, h)
//! score the same.

use candle_core::Tensor;
use relgat_nn::scatter::index_to_vec;

use crate::error::{Error, Result};

/// DistMult score for one triple: `<h, r, t>`.
pub fn score_distmult(head: &[f32], relation: &[f32], tail: &[f32]) -> f32 {
    head.iter()
        .zip(relation)
        .zip(tail)
        .map(|((h, r), t)| h * r * t)
        .sum()
}

/// Score every edge of `edge_index` against its relation vector.
///
/// # Arguments
/// - `z`: Node embeddings `(N, d)`
/// - `edge_index`: `(2, E)` with row 0 = head, row 1 = tail
/// - `edge_type`: `(E,)` ids into `relations`
/// - `relations`: Relation vectors `(R, d)`
///
/// # Returns
/// - Logits `(E,)`
pub fn distmult(z: &Tensor, edge_index: &Tensor, edge_type: &Tensor, relations: &Tensor) -> Result<Tensor> {
    let (_, width) = z.dims2()?;
    let (num_relations, rel_width) = relations.dims2()?;
    if width != rel_width {
        return Err(Error::Validation(format!(
            "embeddings have width {width}, relation vectors have width {rel_width}"
        )));
    }
    if let Some(bad) = index_to_vec(edge_type)?.into_iter().find(|&r| r as usize >= num_relations) {
        return Err(Error::Validation(format!(
            "relation id {bad} out of range for {num_relations} relations"
        )));
    }

    let head = z.index_select(&edge_index.get(0)?, 0)?;
    let tail = z.index_select(&edge_index.get(1)?, 0)?;
    let rel = relations.index_select(edge_type, 0)?;
    Ok(((head * rel)? * tail)?.sum(1)?)
}
