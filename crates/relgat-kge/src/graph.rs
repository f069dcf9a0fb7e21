//! Edge-list helpers.

use candle_core::Tensor;
use relgat_nn::scatter::{index_tensor, index_to_vec};

use crate::error::{Error, Result};

/// Append the reverse of every edge, with relation `r + num_edge_types`.
///
/// ```text
/// (h, r, t)  ->  (h, r, t), (t, r + R, h)
/// ```
///
/// Returns the `(2, 2E)` edge index and `(2E,)` edge types as `u32`.
pub fn add_inverse_edges(
    edge_index: &Tensor,
    edge_type: &Tensor,
    num_edge_types: usize,
) -> Result<(Tensor, Tensor)> {
    let src = index_to_vec(&edge_index.get(0)?)?;
    let dst = index_to_vec(&edge_index.get(1)?)?;
    let types = index_to_vec(edge_type)?;
    if types.len() != src.len() {
        return Err(Error::Validation(format!(
            "edge_type has {} entries for {} edges",
            types.len(),
            src.len()
        )));
    }
    if let Some(bad) = types.iter().find(|&&r| r as usize >= num_edge_types) {
        return Err(Error::Validation(format!(
            "relation id {bad} out of range for {num_edge_types} edge types"
        )));
    }

    let offset = num_edge_types as u32;
    let heads: Vec<u32> = src.iter().chain(&dst).copied().collect();
    let tails: Vec<u32> = dst.iter().chain(&src).copied().collect();
    let relations: Vec<u32> = types.iter().copied().chain(types.iter().map(|r| r + offset)).collect();

    let device = edge_index.device();
    let edge_index = Tensor::stack(&[index_tensor(&heads, device)?, index_tensor(&tails, device)?], 0)?;
    Ok((edge_index, index_tensor(&relations, device)?))
}
