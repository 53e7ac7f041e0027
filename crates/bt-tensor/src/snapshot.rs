use bt_types::Digest;
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::config::TensorConfig;

/// Complete state of a tensor, enough to rebuild it without recomputing any
/// digest.
///
/// No byte format is implied; persist it with any serde format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSnapshot {
    pub dim_count: usize,
    pub width: usize,
    pub max_payload_bytes: usize,
    /// Number of claimed block numbers.
    pub size: usize,
    /// Every block, indexed by block number.
    pub blocks: Vec<Block>,
    /// `line_digests[axis][line_index]`, lines in lexicographic order of
    /// their fixed coordinates.
    pub line_digests: Vec<Vec<Digest>>,
    pub axis_summaries: Vec<Digest>,
}

impl TensorSnapshot {
    /// Shape and limits the snapshot declares.
    pub fn config(&self) -> TensorConfig {
        TensorConfig::new(self.dim_count, self.width).with_max_payload_bytes(self.max_payload_bytes)
    }
}
