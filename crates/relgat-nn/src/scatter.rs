//! Group-wise reductions over edge-indexed tensors.
//!
//! Every function here treats dimension 0 of `src` as the edge axis and
//! groups rows by an integer id per row (`index`), the way sparse GNN
//! libraries do with `scatter_*`:
//!
//! ```text
//! src:    [e0, e1, e2, e3]       index: [1, 0, 1, 1]
//! sum:    [e1, e0 + e2 + e3]     (num_groups = 2)
//! ```
//!
//! Group softmax is built from those pieces: max-by-group, subtract, exp,
//! sum-by-group, divide. Subtracting the group max keeps `exp` in range
//! and does not change the result.

use candle_core::{DType, Device, Tensor};

use crate::error::{Error, Result};

/// Added to the softmax denominator so an all-underflow group does not divide by zero.
const SOFTMAX_EPS: f64 = 1e-16;

/// Copy an integer index tensor to the host as `u32` ids.
pub fn index_to_vec(index: &Tensor) -> Result<Vec<u32>> {
    if index.rank() != 1 {
        return Err(Error::Shape(format!(
            "index tensors must be 1-D, got shape {:?}",
            index.dims()
        )));
    }
    match index.dtype() {
        DType::U32 => Ok(index.to_vec1::<u32>()?),
        DType::U8 => Ok(index.to_vec1::<u8>()?.into_iter().map(u32::from).collect()),
        DType::I64 => index
            .to_vec1::<i64>()?
            .into_iter()
            .map(|i| {
                u32::try_from(i).map_err(|_| Error::Shape(format!("index {i} is out of range")))
            })
            .collect(),
        other => Err(Error::Type(format!(
            "index tensors must be integer-valued, got {other:?}"
        ))),
    }
}

/// Build a `u32` index tensor from host ids.
pub fn index_tensor(ids: &[u32], device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(ids, ids.len(), device)?)
}

/// Sum rows of `src` that share an index: output row `g` is the sum of
/// every `src[e]` with `index[e] == g`. Groups without rows are zero.
pub fn scatter_add(src: &Tensor, index: &Tensor, num_groups: usize) -> Result<Tensor> {
    let mut shape = src.dims().to_vec();
    if shape.is_empty() {
        return Err(Error::Shape("scatter_add needs at least a 1-D source".to_string()));
    }
    shape[0] = num_groups;
    let zeros = Tensor::zeros(shape, src.dtype(), src.device())?;
    if src.dim(0)? == 0 {
        return Ok(zeros);
    }
    Ok(zeros.index_add(index, src, 0)?)
}

/// Number of rows per group, as a float tensor of shape `(num_groups,)`.
///
/// With `index` = edge targets this is the in-degree of every node.
pub fn degree(index: &Tensor, num_groups: usize, dtype: DType) -> Result<Tensor> {
    let ones = Tensor::ones(index.dim(0)?, dtype, index.device())?;
    scatter_add(&ones, index, num_groups)
}

/// Column-wise maximum per group, shaped like `src` with dim 0 = `num_groups`.
///
/// Computed on the host: the result only shifts the softmax input and
/// carries no gradient. candle has no scatter-max, so this costs one
/// device round-trip and a pass over the edges per call. Empty groups get 0.
fn group_max(src: &Tensor, ids: &[u32], num_groups: usize) -> Result<Tensor> {
    let rows = src.dim(0)?;
    let cols = if rows == 0 { 0 } else { src.elem_count() / rows };
    let values = src.to_dtype(DType::F64)?.flatten_all()?.to_vec1::<f64>()?;

    let mut max = vec![f64::NEG_INFINITY; num_groups * cols];
    for (row, &group) in ids.iter().enumerate() {
        let out = &mut max[group as usize * cols..(group as usize + 1) * cols];
        let input = &values[row * cols..(row + 1) * cols];
        for (m, &v) in out.iter_mut().zip(input) {
            if v > *m {
                *m = v;
            }
        }
    }
    for m in max.iter_mut() {
        if !m.is_finite() {
            *m = 0.0;
        }
    }

    let mut shape = src.dims().to_vec();
    shape[0] = num_groups;
    Ok(Tensor::from_vec(max, shape, src.device())?.to_dtype(src.dtype())?)
}

/// Softmax over the rows of `src` that share an index, independently per column.
///
/// A row alone in its group gets coefficient 1.
pub fn softmax(src: &Tensor, index: &Tensor, num_groups: usize) -> Result<Tensor> {
    let ids = index_to_vec(index)?;
    grouped_softmax(src, &ids, num_groups)
}

/// Softmax over contiguous segments: rows `ptr[g]..ptr[g + 1]` form group `g`.
///
/// This is the CSR-layout variant of [`softmax`]; `ptr` must start at 0,
/// be non-decreasing and end at `src.dim(0)`. It is a standalone primitive
/// for callers whose edges are already sorted by target: `RGATConv` groups
/// by target id and does not take a `ptr`, which gives the same
/// coefficients on a sorted layout.
pub fn segment_softmax(src: &Tensor, ptr: &[usize]) -> Result<Tensor> {
    let ids = segment_ids(ptr, src.dim(0)?)?;
    grouped_softmax(src, &ids, ptr.len().saturating_sub(1))
}

/// Expand segment boundaries into one group id per row.
pub fn segment_ids(ptr: &[usize], rows: usize) -> Result<Vec<u32>> {
    match (ptr.first(), ptr.last()) {
        (Some(0), Some(&last)) if last == rows => {}
        _ => {
            return Err(Error::Shape(format!(
                "segment pointer must start at 0 and end at {rows}, got {ptr:?}"
            )))
        }
    }
    let mut ids = Vec::with_capacity(rows);
    for (group, bounds) in ptr.windows(2).enumerate() {
        if bounds[1] < bounds[0] {
            return Err(Error::Shape(format!("segment pointer must be non-decreasing, got {ptr:?}")));
        }
        ids.extend(std::iter::repeat(group as u32).take(bounds[1] - bounds[0]));
    }
    Ok(ids)
}

fn grouped_softmax(src: &Tensor, ids: &[u32], num_groups: usize) -> Result<Tensor> {
    let rows = src.dim(0)?;
    if ids.len() != rows {
        return Err(Error::Shape(format!(
            "softmax index has {} entries for {rows} rows",
            ids.len()
        )));
    }
    if let Some(&bad) = ids.iter().find(|&&g| g as usize >= num_groups) {
        return Err(Error::Shape(format!("group id {bad} out of range for {num_groups} groups")));
    }
    if rows == 0 {
        return Ok(src.clone());
    }

    let index = index_tensor(ids, src.device())?;
    let max = group_max(src, ids, num_groups)?.index_select(&index, 0)?;
    let exp = (src - max)?.exp()?;
    let sum = scatter_add(&exp, &index, num_groups)?.index_select(&index, 0)?;
    Ok((exp / (sum + SOFTMAX_EPS)?)?)
}
