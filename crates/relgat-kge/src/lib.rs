//! Link prediction on knowledge graphs with relational graph attention.
//!
//! Knowledge graphs store facts as (head, relation, tail) triples:
//! `(Einstein, won, NobelPrize)`, `(Paris, capitalOf, France)`.
//! This crate learns an embedding per node by running two
//! [`RGATConv`](relgat_nn::RGATConv) layers over the known triples, then
//! scores candidate triples with a relation-specific decoder.
//!
//! ## Encoder
//!
//! ```text
//! node ids ──embedding──> x ──RGATConv──> x1 ──ReLU──> RGATConv ──> z
//! ```
//!
//! Each layer mixes a node's incoming neighbours, weighted by attention
//! coefficients computed from the relation-transformed endpoints. With
//! more than [`ModelConfig::block_threshold`] edge types the layers switch
//! to block-diagonal transforms to keep the parameter count in check.
//!
//! ## DistMult decoder
//!
//! [Yang et al. 2015](https://arxiv.org/abs/1412.6575) gives every relation
//! a vector `r` and scores a triple with the element-wise product:
//!
//! ```text
//! score(h, r, t) = Σᵢ zₕᵢ × rᵢ × zₜᵢ
//! ```
//!
//! Symmetric by construction: `(h, r, t)` and `(t, r, h)` score the same.
//!
//! ## Inverse relations
//!
//! Messages flow from source to target only. [`add_inverse_edges`] appends
//! `(t, r + R, h)` for every `(h, r, t)` so both endpoints see each other;
//! models built with [`ModelConfig::inverse_relations`] accept those ids.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relgat_kge::{add_inverse_edges, ModelConfig, RGAT};
//!
//! let config = ModelConfig::new(num_nodes, num_edge_types);
//! let model = RGAT::new(config, vb)?;
//!
//! let (edge_index, edge_type) = add_inverse_edges(&edge_index, &edge_type, num_edge_types)?;
//! let z = model.forward_t(&node_ids, &edge_index, &edge_type, true)?;
//! let logits = model.decode(&z, &pos_edge_index, &pos_edge_type)?;
//! ```
//!
//! Training loops own the optimizer and loss; nothing here updates
//! parameters.
//!
//! ## References
//!
//! - Busbridge et al. (2019). "Relational Graph Attention Networks."
//! - Yang et al. (2015). "Embedding Entities and Relations for Learning
//!   and Inference in Knowledge Bases." ICLR.

pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod scoring;

pub use config::ModelConfig;
pub use error::{Error, Result};
pub use graph::add_inverse_edges;
pub use model::RGAT;
pub use scoring::{distmult, score_distmult};
