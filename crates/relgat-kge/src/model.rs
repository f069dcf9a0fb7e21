//! Two-layer relational attention encoder with a DistMult decoder.

use candle_core::{Module, Tensor};
use candle_nn::{Embedding, VarBuilder};
use relgat_nn::init::xavier_uniform;
use relgat_nn::{RGATConfig, RGATConv};

use crate::config::ModelConfig;
use crate::error::Result;
use crate::scoring;

/// Encoder-decoder link predictor.
///
/// ```text
/// node ids -> embedding -> RGATConv -> ReLU -> RGATConv -> z
/// score(h, r, t) = <z_h, rel_r, z_t>
/// ```
#[derive(Debug, Clone)]
pub struct RGAT {
    config: ModelConfig,
    node_emb: Embedding,
    conv1: RGATConv,
    conv2: RGATConv,
    relation_emb: Tensor,
}

impl RGAT {
    pub fn new(config: ModelConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;

        let layer = |in_channels: usize, out_channels: usize| {
            let layer = RGATConfig::new(in_channels, out_channels, config.num_relations());
            match config.blocks() {
                Some(blocks) => layer.with_num_blocks(blocks),
                None => layer,
            }
        };

        let node_emb = candle_nn::embedding(config.num_nodes, config.in_dim, vb.pp("node_emb"))?;
        let conv1 = RGATConv::new(layer(config.in_dim, config.hidden_dim), vb.pp("conv1"))?;
        let conv2 = RGATConv::new(layer(config.hidden_dim, config.out_dim), vb.pp("conv2"))?;
        let relation_emb = vb.get_with_hints(
            (config.num_edge_types, config.out_dim),
            "relation_emb",
            xavier_uniform(config.out_dim, config.num_edge_types, 2f64.sqrt()),
        )?;

        tracing::debug!(
            num_nodes = config.num_nodes,
            num_edge_types = config.num_edge_types,
            num_relations = config.num_relations(),
            blocks = ?config.blocks(),
            "built RGAT"
        );

        Ok(Self { config, node_emb, conv1, conv2, relation_emb })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn layers(&self) -> (&RGATConv, &RGATConv) {
        (&self.conv1, &self.conv2)
    }

    /// Decoder relation vectors `(num_edge_types, out_dim)`.
    pub fn relation_embeddings(&self) -> &Tensor {
        &self.relation_emb
    }

    /// Final node embeddings `(len(node_ids), out_dim)`, inference mode.
    ///
    /// `edge_index` refers to positions in `node_ids`.
    pub fn encode(&self, node_ids: &Tensor, edge_index: &Tensor, edge_type: &Tensor) -> Result<Tensor> {
        self.forward_t(node_ids, edge_index, edge_type, false)
    }

    /// Final node embeddings; `train` is passed to both convolutions.
    pub fn forward_t(
        &self,
        node_ids: &Tensor,
        edge_index: &Tensor,
        edge_type: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        Ok(self.encode_all(node_ids, edge_index, edge_type, train)?.1)
    }

    /// Layer-1 output (before the ReLU) and layer-2 output.
    pub fn encode_all(
        &self,
        node_ids: &Tensor,
        edge_index: &Tensor,
        edge_type: &Tensor,
        train: bool,
    ) -> Result<(Tensor, Tensor)> {
        let x = self.node_emb.forward(node_ids)?;
        let x1 = self.conv1.forward_t(&x, edge_index, edge_type, None, train)?;
        let x2 = self.conv2.forward_t(&x1.relu()?, edge_index, edge_type, None, train)?;
        Ok((x1, x2))
    }

    /// DistMult logits `(E,)` for the given edges.
    pub fn decode(&self, z: &Tensor, edge_index: &Tensor, edge_type: &Tensor) -> Result<Tensor> {
        scoring::distmult(z, edge_index, edge_type, &self.relation_emb)
    }
}
