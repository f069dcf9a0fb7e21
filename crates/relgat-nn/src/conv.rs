//! Relational graph attention convolution.
//!
//! [`RGATConv`] (Busbridge et al., 2019) extends GAT to multi-relational
//! graphs: every edge carries a relation id that selects the linear map
//! applied to its endpoints, and attention decides how much each
//! neighbor contributes.
//!
//! # Message Passing Framework
//!
//! ```text
//! h_i' = UPDATE( Σ_{(j -r-> i)} MESSAGE(h_i, h_j, r) )
//! ```
//!
//! For one edge `j -> i` with relation `r`:
//!
//! 1. **Transform**: `o_i = W_r h_i`, `o_j = W_r h_j`
//! 2. **Score**: `q_i = o_i Q`, `k_j = o_j K`, then
//!    - additive: `s = LeakyReLU(q_i + k_j [+ e_ij E])`
//!    - multiplicative: `s = q_i ⊙ k_j [⊙ e_ij E]`
//! 3. **Normalize**: softmax of `s` over edges into `i`
//!    (across-relation) or over edges into `i` with relation `r`
//!    (within-relation)
//! 4. **Modulate**: optional residual, degree scaling, shift, or dropout
//! 5. **Aggregate**: sum `α_ij ⊙ o_j` into `i`
//! 6. **Update**: concatenate or average heads, add bias
//!
//! # Attention shapes
//!
//! | Score | Coefficients per edge | Message per edge |
//! |-------|----------------------|------------------|
//! | additive | `(heads,)` | `(heads, out)` |
//! | multiplicative | `(heads, dim)` | `(heads, dim, out)` |
//!
//! Internally both modes use the `(E, heads, dim, out)` layout, with
//! `dim = 1` for additive scoring.
//!
//! # Reference
//!
//! Busbridge et al., "Relational Graph Attention Networks", 2019.

use candle_core::{DType, Tensor};
use candle_nn::{ops, Linear, Module, VarBuilder};

use crate::config::{AttentionScope, AttentionScore, Modulation, RGATConfig};
use crate::error::{Error, Result};
use crate::init::glorot;
use crate::scatter;
use crate::transform::RelationTransform;

/// Edge-attribute projection: `edge_dim -> heads*out_channels -> heads*dim`.
#[derive(Debug, Clone)]
struct EdgeProjection {
    lin: Linear,
    e: Tensor,
}

/// Parameters read by the `additive` and `scaled` modulation modes.
#[derive(Debug, Clone)]
struct ModulationParams {
    /// Residual weight, `(out_channels,)`.
    w: Tensor,
    l1: Tensor,
    b1: Tensor,
    l2: Tensor,
    b2: Tensor,
}

impl ModulationParams {
    fn new(out_channels: usize, vb: &VarBuilder) -> Result<Self> {
        use candle_nn::Init::Const;
        let c = out_channels;
        Ok(Self {
            w: vb.get_with_hints(c, "w", Const(1.0))?,
            l1: vb.get_with_hints((1, c), "l1", Const(1.0))?,
            b1: vb.get_with_hints((1, c), "b1", Const(0.0))?,
            l2: vb.get_with_hints((c, c), "l2", Const(1.0 / c.max(1) as f64))?,
            b2: vb.get_with_hints((1, c), "b2", Const(0.0))?,
        })
    }

    /// Two-layer head on the in-degree: `relu(deg l1 + b1) l2 + b2`, `(E, 1) -> (E, out)`.
    fn degree_scale(&self, degree: &Tensor) -> Result<Tensor> {
        let hidden = degree.matmul(&self.l1)?.broadcast_add(&self.b1)?.relu()?;
        Ok(hidden.matmul(&self.l2)?.broadcast_add(&self.b2)?)
    }
}

/// Validated edge list with indices on the host and on the device.
struct Edges {
    src: Tensor,
    dst: Tensor,
    edge_type: Tensor,
    dst_ids: Vec<u32>,
    type_ids: Vec<u32>,
}

impl Edges {
    fn new(edge_index: &Tensor, edge_type: &Tensor, num_nodes: usize, num_relations: usize) -> Result<Self> {
        let (rows, num_edges) = edge_index.dims2().map_err(|_| {
            Error::Shape(format!("edge_index must be (2, E), got {:?}", edge_index.dims()))
        })?;
        if rows != 2 {
            return Err(Error::Shape(format!("edge_index must be (2, E), got {:?}", edge_index.dims())));
        }
        let src_ids = scatter::index_to_vec(&edge_index.get(0)?)?;
        let dst_ids = scatter::index_to_vec(&edge_index.get(1)?)?;
        let type_ids = scatter::index_to_vec(edge_type)?;

        if type_ids.len() != num_edges {
            return Err(Error::Shape(format!(
                "edge_type has {} entries for {num_edges} edges",
                type_ids.len()
            )));
        }
        if let Some(&bad) = src_ids.iter().chain(&dst_ids).find(|&&n| n as usize >= num_nodes) {
            return Err(Error::Shape(format!("node index {bad} out of range for {num_nodes} nodes")));
        }
        if let Some(&bad) = type_ids.iter().find(|&&r| r as usize >= num_relations) {
            return Err(Error::Shape(format!(
                "relation id {bad} out of range for {num_relations} relations"
            )));
        }

        let device = edge_index.device();
        Ok(Self {
            src: scatter::index_tensor(&src_ids, device)?,
            dst: scatter::index_tensor(&dst_ids, device)?,
            edge_type: scatter::index_tensor(&type_ids, device)?,
            dst_ids,
            type_ids,
        })
    }

    fn len(&self) -> usize {
        self.dst_ids.len()
    }

    /// Group key `target * num_relations + relation`, one group per (node, relation) pair.
    fn relation_groups(&self, num_nodes: usize, num_relations: usize) -> Result<(Tensor, usize)> {
        let num_groups = num_nodes
            .checked_mul(num_relations)
            .filter(|&g| g <= u32::MAX as usize)
            .ok_or_else(|| {
                Error::Shape(format!(
                    "{num_nodes} nodes x {num_relations} relations exceeds the u32 group id range"
                ))
            })?;
        let keys: Vec<u32> = self
            .dst_ids
            .iter()
            .zip(&self.type_ids)
            .map(|(&d, &r)| d * num_relations as u32 + r)
            .collect();
        Ok((scatter::index_tensor(&keys, self.dst.device())?, num_groups))
    }
}

/// `alpha + 1` where `alpha > 0`; other entries unchanged (`f-additive` modulation).
pub fn shift_positive(alpha: &Tensor) -> Result<Tensor> {
    Ok(alpha.gt(0.0)?.where_cond(&(alpha + 1.0)?, alpha)?)
}

/// Normalized attention coefficients of one forward call.
#[derive(Debug, Clone)]
pub struct AttentionWeights {
    /// The `(2, E)` edge index the coefficients belong to.
    pub edge_index: Tensor,
    /// `(E, heads * dim)` coefficients, before any modulation.
    pub weights: Tensor,
}

/// Relational graph attention layer.
///
/// Holds parameters only; every call is a pure function of its inputs and
/// those parameters, so concurrent inference on one layer is fine as long
/// as nothing updates the parameters meanwhile.
///
/// # Example
///
/// ```rust
/// use candle_core::{DType, Device, Tensor};
/// use candle_nn::{VarBuilder, VarMap};
/// use relgat_nn::{RGATConfig, RGATConv};
///
/// let device = Device::Cpu;
/// let varmap = VarMap::new();
/// let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
///
/// let conv = RGATConv::new(RGATConfig::new(3, 2, 2), vb)?;
/// let x = Tensor::randn(0f32, 1., (4, 3), &device)?;
/// let edge_index = Tensor::new(&[[0u32, 1, 2], [1, 2, 3]], &device)?;
/// let edge_type = Tensor::new(&[0u32, 1, 0], &device)?;
///
/// let out = conv.forward(&x, &edge_index, &edge_type, None)?;
/// assert_eq!(out.dims(), &[4, 2]);
/// # Ok::<(), relgat_nn::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct RGATConv {
    config: RGATConfig,
    transform: RelationTransform,
    q: Tensor,
    k: Tensor,
    edge: Option<EdgeProjection>,
    modulation: ModulationParams,
    bias: Option<Tensor>,
}

impl RGATConv {
    /// Validate `config` and allocate the layer's parameters under `vb`.
    pub fn new(config: RGATConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;

        let width = config.hidden_width();
        let att_width = config.heads * config.dim;

        let transform = RelationTransform::new(&config, &vb)?;
        let q = vb.get_with_hints((width, att_width), "q", glorot(width, att_width))?;
        let k = vb.get_with_hints((width, att_width), "k", glorot(width, att_width))?;

        let edge = match config.edge_dim {
            Some(edge_dim) => {
                let weight = vb.pp("lin_edge").get_with_hints(
                    (width, edge_dim),
                    "weight",
                    glorot(edge_dim, width),
                )?;
                let e = vb.get_with_hints((width, att_width), "e", glorot(width, att_width))?;
                Some(EdgeProjection { lin: Linear::new(weight, None), e })
            }
            None => None,
        };

        let modulation = ModulationParams::new(config.out_channels, &vb)?;
        let bias = if config.bias {
            Some(vb.get_with_hints(config.output_width(), "bias", candle_nn::Init::Const(0.0))?)
        } else {
            None
        };

        tracing::debug!(
            transform = transform.kind(),
            in_channels = config.in_channels,
            out_channels = config.out_channels,
            num_relations = config.num_relations,
            heads = config.heads,
            dim = config.dim,
            scope = %config.attention_scope,
            score = %config.attention_score,
            modulation = %config.modulation,
            "built RGATConv"
        );

        Ok(Self { config, transform, q, k, edge, modulation, bias })
    }

    pub fn config(&self) -> &RGATConfig {
        &self.config
    }

    pub fn transform(&self) -> &RelationTransform {
        &self.transform
    }

    /// Inference forward pass (no dropout).
    ///
    /// # Arguments
    /// - `x`: Node features `(N, in_channels)`
    /// - `edge_index`: `(2, E)` with row 0 = source, row 1 = target
    /// - `edge_type`: `(E,)` relation ids in `[0, num_relations)`
    /// - `edge_attr`: Optional `(E, edge_dim)` or `(E,)` edge features
    ///
    /// # Returns
    /// - Node features `(N, output_width)`
    pub fn forward(
        &self,
        x: &Tensor,
        edge_index: &Tensor,
        edge_type: &Tensor,
        edge_attr: Option<&Tensor>,
    ) -> Result<Tensor> {
        self.forward_t(x, edge_index, edge_type, edge_attr, false)
    }

    /// Forward pass; `train` enables coefficient dropout.
    pub fn forward_t(
        &self,
        x: &Tensor,
        edge_index: &Tensor,
        edge_type: &Tensor,
        edge_attr: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        Ok(self.propagate(x, edge_index, edge_type, edge_attr, train)?.0)
    }

    /// Forward pass that also returns the normalized attention coefficients.
    pub fn forward_with_attention(
        &self,
        x: &Tensor,
        edge_index: &Tensor,
        edge_type: &Tensor,
        edge_attr: Option<&Tensor>,
        train: bool,
    ) -> Result<(Tensor, AttentionWeights)> {
        let (out, weights) = self.propagate(x, edge_index, edge_type, edge_attr, train)?;
        Ok((out, AttentionWeights { edge_index: edge_index.clone(), weights }))
    }

    fn propagate(
        &self,
        x: &Tensor,
        edge_index: &Tensor,
        edge_type: &Tensor,
        edge_attr: Option<&Tensor>,
        train: bool,
    ) -> Result<(Tensor, Tensor)> {
        let num_nodes = x.dim(0)?;
        let edges = Edges::new(edge_index, edge_type, num_nodes, self.config.num_relations)?;

        tracing::trace!(
            num_nodes,
            num_edges = edges.len(),
            scope = %self.config.attention_scope,
            score = %self.config.attention_score,
            modulation = %self.config.modulation,
            train,
            "RGATConv forward"
        );

        let c = &self.config;
        let dim = self.message_dim();
        if edges.len() == 0 {
            let dtype = self.q.dtype();
            let aggr = Tensor::zeros((num_nodes, c.heads, dim, c.out_channels), dtype, x.device())?;
            let alpha = Tensor::zeros((0, c.heads * c.dim), dtype, x.device())?;
            return Ok((self.update(aggr)?, alpha));
        }

        let x_i = x.index_select(&edges.dst, 0)?;
        let x_j = x.index_select(&edges.src, 0)?;
        let (messages, alpha) = self.message(&x_i, &x_j, &edges, edge_attr, num_nodes, train)?;
        let aggr = scatter::scatter_add(&messages, &edges.dst, num_nodes)?;
        Ok((self.update(aggr)?, alpha))
    }

    /// Size of the `dim` axis of messages: `dim` for multiplicative scoring, 1 otherwise.
    fn message_dim(&self) -> usize {
        match self.config.attention_score {
            AttentionScore::Additive => 1,
            AttentionScore::Multiplicative => self.config.dim,
        }
    }

    /// Per-edge messages `(E, heads, dim, out)` and normalized coefficients `(E, heads*dim)`.
    fn message(
        &self,
        x_i: &Tensor,
        x_j: &Tensor,
        edges: &Edges,
        edge_attr: Option<&Tensor>,
        num_nodes: usize,
        train: bool,
    ) -> Result<(Tensor, Tensor)> {
        let (out_i, out_j) = self.transform.apply(x_i, x_j, &edges.edge_type)?;

        let q_i = out_i.matmul(&self.q)?;
        let k_j = out_j.matmul(&self.k)?;
        let edge_term = match edge_attr {
            Some(attr) => Some(self.edge_term(attr, edges)?),
            None => None,
        };

        let score = match self.config.attention_score {
            AttentionScore::Additive => {
                let s = (q_i + k_j)?;
                let s = match edge_term {
                    Some(t) => (s + t)?,
                    None => s,
                };
                ops::leaky_relu(&s, self.config.negative_slope)?
            }
            // Elementwise, not a dot product: the `dim` axis survives.
            AttentionScore::Multiplicative => {
                let s = (q_i * k_j)?;
                match edge_term {
                    Some(t) => (s * t)?,
                    None => s,
                }
            }
        };

        let alpha = self.normalize(&score, edges, num_nodes)?;
        let messages = self.modulate(&alpha, &out_j, edges, num_nodes, train)?;
        Ok((messages, alpha))
    }

    /// `(E, heads*dim)` contribution of edge attributes to the raw score.
    fn edge_term(&self, edge_attr: &Tensor, edges: &Edges) -> Result<Tensor> {
        let proj = self.edge.as_ref().ok_or_else(|| {
            Error::Shape(
                "edge attributes supplied but the layer has no edge projection; \
                 set edge_dim = edge_attr.size(-1)"
                    .to_string(),
            )
        })?;
        let edge_attr = match edge_attr.rank() {
            1 => edge_attr.unsqueeze(1)?,
            2 => edge_attr.clone(),
            _ => {
                return Err(Error::Shape(format!(
                    "edge_attr must be (E,) or (E, edge_dim), got {:?}",
                    edge_attr.dims()
                )))
            }
        };
        let expected = proj.lin.weight().dim(1)?;
        if edge_attr.dim(1)? != expected {
            return Err(Error::Shape(format!(
                "edge_attr has width {}, edge_dim is {expected}",
                edge_attr.dim(1)?
            )));
        }

        let projected = proj.lin.forward(&edge_attr)?;
        // One row per relation instead of per edge: expand by relation id.
        let projected = if projected.dim(0)? != edges.len() {
            projected.index_select(&edges.edge_type, 0)?
        } else {
            projected
        };
        Ok(projected.matmul(&proj.e)?)
    }

    /// Group softmax keyed by target id (or target and relation).
    ///
    /// Keys are explicit ids, so edges need not be sorted; a CSR `ptr` over
    /// sorted edges is handled by [`scatter::segment_softmax`] outside the layer.
    fn normalize(&self, score: &Tensor, edges: &Edges, num_nodes: usize) -> Result<Tensor> {
        match self.config.attention_scope {
            AttentionScope::AcrossRelation => scatter::softmax(score, &edges.dst, num_nodes),
            AttentionScope::WithinRelation => {
                let (groups, num_groups) = edges.relation_groups(num_nodes, self.config.num_relations)?;
                scatter::softmax(score, &groups, num_groups)
            }
        }
    }

    /// In-degree of each edge's target, `(E, 1)`.
    fn edge_degree(&self, edges: &Edges, num_nodes: usize, dtype: DType) -> Result<Tensor> {
        let degree = scatter::degree(&edges.dst, num_nodes, dtype)?;
        Ok(degree.index_select(&edges.dst, 0)?.unsqueeze(1)?)
    }

    /// Apply the modulation mode and build the final `(E, heads, dim, out)` messages.
    fn modulate(
        &self,
        alpha: &Tensor,
        out_j: &Tensor,
        edges: &Edges,
        num_nodes: usize,
        train: bool,
    ) -> Result<Tensor> {
        let c = &self.config;
        let e = edges.len();
        let dim = self.message_dim();
        let out_j = out_j.reshape((e, c.heads, 1, c.out_channels))?;
        let weighted = |alpha: &Tensor| -> Result<Tensor> {
            Ok(out_j.broadcast_mul(&alpha.reshape((e, c.heads, dim, 1))?)?)
        };

        let alpha = match c.modulation {
            Modulation::Additive => {
                let residual = out_j.broadcast_mul(&self.modulation.w)?;
                return Ok(weighted(alpha)?.broadcast_add(&residual)?);
            }
            Modulation::Scaled => {
                let degree = self.edge_degree(edges, num_nodes, alpha.dtype())?;
                let scale = self.modulation.degree_scale(&degree)?;
                return Ok(weighted(alpha)?.broadcast_mul(&scale.reshape((e, 1, 1, c.out_channels))?)?);
            }
            Modulation::FAdditive => shift_positive(alpha)?,
            Modulation::FScaled => {
                let degree = self.edge_degree(edges, num_nodes, alpha.dtype())?;
                alpha.broadcast_mul(&degree)?
            }
            Modulation::None if train && c.dropout > 0.0 => ops::dropout(alpha, c.dropout)?,
            Modulation::None => alpha.clone(),
        };
        weighted(&alpha)
    }

    /// Collapse heads: `(N, heads, dim, out)` -> `(N, output_width)`.
    fn update(&self, aggr: Tensor) -> Result<Tensor> {
        let c = &self.config;
        let n = aggr.dim(0)?;
        let dim = self.message_dim();
        let out = if c.concat {
            aggr.reshape((n, c.heads * dim * c.out_channels))?
        } else {
            aggr.mean(1)?.reshape((n, dim * c.out_channels))?
        };
        Ok(match &self.bias {
            Some(bias) => out.broadcast_add(bias)?,
            None => out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::VarMap;

    fn vb(varmap: &VarMap) -> VarBuilder<'_> {
        VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu)
    }

    /// 4 nodes, 5 edges: a self-loop on 0 and parallel 1 -> 2 edges with different relations.
    fn small_graph() -> (Tensor, Tensor, Tensor) {
        let device = Device::Cpu;
        let x = Tensor::new(
            &[[0.1f32, -0.2, 0.3], [0.5, 0.1, -0.4], [-0.3, 0.8, 0.2], [0.0, 0.4, -0.1]],
            &device,
        )
        .unwrap();
        let edge_index = Tensor::new(&[[0u32, 1, 1, 3, 2], [0, 2, 2, 2, 0]], &device).unwrap();
        let edge_type = Tensor::new(&[0u32, 0, 1, 1, 0], &device).unwrap();
        (x, edge_index, edge_type)
    }

    fn weights(conv: &RGATConv, x: &Tensor, ei: &Tensor, et: &Tensor) -> (Tensor, Vec<Vec<f32>>) {
        let (out, att) = conv.forward_with_attention(x, ei, et, None, false).unwrap();
        (out, att.weights.to_vec2::<f32>().unwrap())
    }

    #[test]
    fn test_output_shapes() {
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2), vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();

        let (out, alpha) = weights(&conv, &x, &ei, &et);
        assert_eq!(out.dims(), &[4, 2]);
        assert_eq!(alpha.len(), 5);
        assert_eq!(alpha[0].len(), 1);
    }

    #[test]
    fn test_across_relation_sums_to_one() {
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2), vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();
        let (_, alpha) = weights(&conv, &x, &ei, &et);

        // target 0: edges 0, 4; target 2: edges 1, 2, 3
        assert!((alpha[0][0] + alpha[4][0] - 1.0).abs() < 1e-5);
        assert!((alpha[1][0] + alpha[2][0] + alpha[3][0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_within_relation_sums_per_relation() {
        let varmap = VarMap::new();
        let config = RGATConfig::new(3, 2, 2).with_attention_scope(AttentionScope::WithinRelation);
        let conv = RGATConv::new(config, vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();
        let (_, alpha) = weights(&conv, &x, &ei, &et);

        // target 0, relation 0: edges 0 and 4
        assert!((alpha[0][0] + alpha[4][0] - 1.0).abs() < 1e-5);
        // target 2, relation 0: edge 1 alone
        assert!((alpha[1][0] - 1.0).abs() < 1e-5);
        // target 2, relation 1: edges 2 and 3
        assert!((alpha[2][0] + alpha[3][0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_isolated_target_gets_bias_only() {
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2), vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();
        let out = conv.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        // nodes 1 and 3 have no incoming edges; bias initializes to zero
        assert_eq!(out[1], vec![0.0, 0.0]);
        assert_eq!(out[3], vec![0.0, 0.0]);
    }

    #[test]
    fn test_multiplicative_heads_and_dim() {
        let varmap = VarMap::new();
        let config = RGATConfig::new(3, 4, 2)
            .with_heads(2)
            .with_dim(3)
            .with_attention_score(AttentionScore::Multiplicative);
        let conv = RGATConv::new(config, vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();

        let (out, alpha) = weights(&conv, &x, &ei, &et);
        assert_eq!(out.dims(), &[4, 2 * 3 * 4]);
        assert_eq!(alpha[0].len(), 6);
        for col in 0..6 {
            let s = alpha[1][col] + alpha[2][col] + alpha[3][col];
            assert!((s - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_mean_over_heads() {
        let varmap = VarMap::new();
        let config = RGATConfig::new(3, 4, 2)
            .with_heads(3)
            .with_concat(false)
            .with_attention_score(AttentionScore::Multiplicative)
            .with_dim(2);
        let conv = RGATConv::new(config, vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();
        let out = conv.forward(&x, &ei, &et, None).unwrap();
        assert_eq!(out.dims(), &[4, 8]);
    }

    #[test]
    fn test_edge_attr_requires_edge_dim() {
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2), vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();
        let attr = Tensor::ones(5, DType::F32, &Device::Cpu).unwrap();
        let err = conv.forward(&x, &ei, &et, Some(&attr)).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_edge_attr_one_dimensional() {
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2).with_edge_dim(1), vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();
        let attr = Tensor::new(&[0.5f32, 1.0, -1.0, 2.0, 0.0], &Device::Cpu).unwrap();

        let (out, alpha) = conv.forward_with_attention(&x, &ei, &et, Some(&attr), false).unwrap();
        assert_eq!(out.dims(), &[4, 2]);
        let alpha = alpha.weights.to_vec2::<f32>().unwrap();
        assert!((alpha[0][0] + alpha[4][0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_edge_attr_width_checked() {
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2).with_edge_dim(2), vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();
        let attr = Tensor::ones((5, 3), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(conv.forward(&x, &ei, &et, Some(&attr)), Err(Error::Shape(_))));
    }

    #[test]
    fn test_edge_attr_per_relation_expands_by_type() {
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2).with_edge_dim(2), vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();
        let per_relation = Tensor::new(&[[0.5f32, -1.0], [2.0, 0.25]], &Device::Cpu).unwrap();
        let per_edge = per_relation.index_select(&et, 0).unwrap();

        let (a, att_a) = conv.forward_with_attention(&x, &ei, &et, Some(&per_relation), false).unwrap();
        let (b, att_b) = conv.forward_with_attention(&x, &ei, &et, Some(&per_edge), false).unwrap();
        assert_eq!(a.dims(), &[4, 2]);
        let diff = (a - b).unwrap().abs().unwrap().max_all().unwrap().to_scalar::<f32>().unwrap();
        assert!(diff < 1e-6);
        let diff = (att_a.weights - att_b.weights)
            .unwrap()
            .abs()
            .unwrap()
            .max_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_f_additive_shifts_messages() {
        // Same parameters, with and without the shift: each message gains exactly out_j.
        let varmap = VarMap::new();
        let base = RGATConfig::new(3, 2, 2).with_bias(false);
        let plain = RGATConv::new(base.clone(), vb(&varmap)).unwrap();
        let shifted = RGATConv::new(base.with_modulation(Modulation::FAdditive), vb(&varmap)).unwrap();

        let device = Device::Cpu;
        let x = Tensor::new(&[[1f32, 0.5, -0.5], [0.2, 0.3, 0.4]], &device).unwrap();
        let ei = Tensor::new(&[[0u32], [1]], &device).unwrap();
        let et = Tensor::new(&[1u32], &device).unwrap();

        let a = plain.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        let b = shifted.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        // single edge: alpha = 1 -> 2 after the shift
        for (p, s) in a[1].iter().zip(&b[1]) {
            assert!((2.0 * p - s).abs() < 1e-5);
        }
    }

    #[test]
    fn test_f_scaled_multiplies_by_degree() {
        let varmap = VarMap::new();
        let base = RGATConfig::new(3, 2, 2).with_bias(false);
        let plain = RGATConv::new(base.clone(), vb(&varmap)).unwrap();
        let scaled = RGATConv::new(base.with_modulation(Modulation::FScaled), vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();

        let a = plain.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        let b = scaled.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        // node 2 has in-degree 3, node 0 has in-degree 2
        for (p, s) in a[2].iter().zip(&b[2]) {
            assert!((3.0 * p - s).abs() < 1e-4);
        }
        for (p, s) in a[0].iter().zip(&b[0]) {
            assert!((2.0 * p - s).abs() < 1e-4);
        }
    }

    #[test]
    fn test_additive_and_scaled_modulation_shapes() {
        let (x, ei, et) = small_graph();
        for score in [AttentionScore::Additive, AttentionScore::Multiplicative] {
            for modulation in [Modulation::Additive, Modulation::Scaled] {
                let varmap = VarMap::new();
                let dim = if score == AttentionScore::Additive { 1 } else { 2 };
                let config = RGATConfig::new(3, 2, 2)
                    .with_heads(2)
                    .with_dim(dim)
                    .with_attention_score(score)
                    .with_modulation(modulation);
                let conv = RGATConv::new(config.clone(), vb(&varmap)).unwrap();
                let out = conv.forward(&x, &ei, &et, None).unwrap();
                assert_eq!(out.dims(), &[4, config.output_width()]);
            }
        }
    }

    #[test]
    fn test_scaled_head_reads_in_degree() {
        // At init relu(deg * 1 + 0) @ (1/c) + 0 = deg on every channel.
        let mut varmap = VarMap::new();
        let base = RGATConfig::new(3, 2, 2).with_bias(false);
        let scaled = RGATConv::new(base.clone().with_modulation(Modulation::Scaled), vb(&varmap)).unwrap();
        let f_scaled = RGATConv::new(base.with_modulation(Modulation::FScaled), vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();

        let a = scaled.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        let b = f_scaled.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        for (ra, rb) in a.iter().zip(&b) {
            for (p, q) in ra.iter().zip(rb) {
                assert!((p - q).abs() < 1e-5);
            }
        }

        // Doubling l2 doubles the scale.
        let l2 = Tensor::full(1f32, (2, 2), &Device::Cpu).unwrap();
        varmap.set_one("l2", &l2).unwrap();
        let c = scaled.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        for (rc, rb) in c.iter().zip(&b) {
            for (p, q) in rc.iter().zip(rb) {
                assert!((p - 2.0 * q).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_additive_modulation_adds_residual() {
        // With w = 1 the message is out_j * (alpha + 1); a single edge has alpha = 1.
        let varmap = VarMap::new();
        let base = RGATConfig::new(3, 2, 2).with_bias(false);
        let plain = RGATConv::new(base.clone(), vb(&varmap)).unwrap();
        let additive = RGATConv::new(base.with_modulation(Modulation::Additive), vb(&varmap)).unwrap();

        let device = Device::Cpu;
        let x = Tensor::new(&[[1f32, 0.5, -0.5], [0.2, 0.3, 0.4]], &device).unwrap();
        let ei = Tensor::new(&[[0u32], [1]], &device).unwrap();
        let et = Tensor::new(&[0u32], &device).unwrap();

        let a = plain.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        let b = additive.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        for (p, s) in a[1].iter().zip(&b[1]) {
            assert!((2.0 * p - s).abs() < 1e-5);
        }
    }

    #[test]
    fn test_dropout_only_while_training() {
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2).with_dropout(0.5), vb(&varmap)).unwrap();
        let (x, ei, et) = small_graph();

        let a = conv.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        let b = conv.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(a, b);

        let trained = conv.forward_t(&x, &ei, &et, None, true).unwrap();
        assert_eq!(trained.dims(), &[4, 2]);
    }

    #[test]
    fn test_dropout_zeroes_or_rescales_coefficients() {
        // Every target has a single incoming edge, so alpha = 1 and
        // dropout(0.5) turns the message into 0 or 2 * message.
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2).with_dropout(0.5).with_bias(false), vb(&varmap))
            .unwrap();
        let device = Device::Cpu;
        let x = Tensor::new(&[[1f32, 0.5, -0.5], [0.2, 0.3, 0.4], [-0.6, 0.1, 0.9]], &device).unwrap();
        let ei = Tensor::new(&[[0u32, 1], [1, 2]], &device).unwrap();
        let et = Tensor::new(&[0u32, 1], &device).unwrap();

        let eval = conv.forward(&x, &ei, &et, None).unwrap().to_vec2::<f32>().unwrap();
        assert!(eval[1].iter().chain(&eval[2]).any(|v| v.abs() > 1e-6));

        let (mut dropped, mut kept) = (0, 0);
        for _ in 0..64 {
            let out = conv.forward_t(&x, &ei, &et, None, true).unwrap().to_vec2::<f32>().unwrap();
            for node in [1, 2] {
                if out[node].iter().all(|v| *v == 0.0) {
                    dropped += 1;
                } else {
                    for (t, e) in out[node].iter().zip(&eval[node]) {
                        assert!((t - 2.0 * e).abs() < 1e-5);
                    }
                    kept += 1;
                }
            }
        }
        assert!(dropped > 0 && kept > 0);
    }

    #[test]
    fn test_block_and_basis_forward() {
        let (x, ei, et) = small_graph();
        let varmap = VarMap::new();
        let basis = RGATConv::new(RGATConfig::new(3, 2, 2).with_num_bases(2), vb(&varmap)).unwrap();
        assert_eq!(basis.forward(&x, &ei, &et, None).unwrap().dims(), &[4, 2]);

        let varmap = VarMap::new();
        let block = RGATConv::new(RGATConfig::new(3, 3, 2).with_num_blocks(3), vb(&varmap)).unwrap();
        assert_eq!(block.forward(&x, &ei, &et, None).unwrap().dims(), &[4, 3]);
    }

    #[test]
    fn test_construction_errors() {
        let varmap = VarMap::new();
        let err = RGATConv::new(RGATConfig::new(8, 4, 2).with_num_bases(2).with_num_blocks(4), vb(&varmap))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = RGATConv::new(RGATConfig::new(8, 4, 2).with_heads(3).with_num_blocks(3), vb(&varmap))
            .unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_invalid_edges_rejected() {
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2), vb(&varmap)).unwrap();
        let (x, _, _) = small_graph();
        let device = Device::Cpu;

        let out_of_range = Tensor::new(&[[0u32], [7]], &device).unwrap();
        let et = Tensor::new(&[0u32], &device).unwrap();
        assert!(matches!(conv.forward(&x, &out_of_range, &et, None), Err(Error::Shape(_))));

        let ei = Tensor::new(&[[0u32], [1]], &device).unwrap();
        let bad_type = Tensor::new(&[2u32], &device).unwrap();
        assert!(matches!(conv.forward(&x, &ei, &bad_type, None), Err(Error::Shape(_))));

        let short_type = Tensor::new(&[0u32, 1], &device).unwrap();
        assert!(matches!(conv.forward(&x, &ei, &short_type, None), Err(Error::Shape(_))));
    }

    #[test]
    fn test_no_edges() {
        let varmap = VarMap::new();
        let conv = RGATConv::new(RGATConfig::new(3, 2, 2), vb(&varmap)).unwrap();
        let (x, _, _) = small_graph();
        let device = Device::Cpu;
        let ei = Tensor::zeros((2, 0), DType::U32, &device).unwrap();
        let et = Tensor::zeros(0, DType::U32, &device).unwrap();

        let (out, att) = conv.forward_with_attention(&x, &ei, &et, None, false).unwrap();
        assert_eq!(out.dims(), &[4, 2]);
        assert_eq!(att.weights.dims(), &[0, 1]);
    }
}
