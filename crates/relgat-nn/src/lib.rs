//! Relational graph attention on candle tensors.
//!
//! `relgat-nn` provides [`RGATConv`], a message-passing layer for
//! multi-relational graphs (knowledge graphs, heterogeneous graphs with
//! typed edges). It sits below `relgat-kge`, which stacks two layers into
//! an encoder and scores triples with DistMult.
//!
//! # Modules
//!
//! - [`conv`]: The attention layer
//! - [`config`]: Layer configuration and option enums
//! - [`transform`]: Full, basis and block-diagonal relation transforms
//! - [`scatter`]: Group-wise sum, degree and softmax over edges
//! - [`init`]: Glorot/Xavier initializers
//!
//! # Example
//!
//! ```rust,ignore
//! use relgat_nn::{AttentionScope, Modulation, RGATConfig, RGATConv};
//!
//! let config = RGATConfig::new(64, 32, num_relations)
//!     .with_heads(4)
//!     .with_num_bases(8)
//!     .with_attention_scope(AttentionScope::WithinRelation)
//!     .with_modulation(Modulation::FAdditive);
//! let conv = RGATConv::new(config, vb)?;
//!
//! let (out, attention) = conv.forward_with_attention(&x, &edge_index, &edge_type, None, false)?;
//! // out: (N, 4 * 32), attention.weights: (E, 4)
//! ```

pub mod config;
pub mod conv;
pub mod error;
pub mod init;
pub mod scatter;
pub mod transform;

pub use config::{AttentionScope, AttentionScore, Modulation, RGATConfig};
pub use conv::{AttentionWeights, RGATConv};
pub use error::{ConfigError, Error, Result};
pub use transform::RelationTransform;
