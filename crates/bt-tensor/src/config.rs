use bt_space::CoordinateSpace;
use serde::{Deserialize, Serialize};

use crate::error::{TensorError, TensorResult};

/// Default payload ceiling: 1 GiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1 << 30;

/// Width chosen by [`TensorConfig::for_capacity`].
pub const SIZED_WIDTH: usize = 3;

/// Shape and limits of a block tensor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorConfig {
    pub dim_count: usize,
    pub width: usize,
    pub max_payload_bytes: usize,
}

impl Default for TensorConfig {
    fn default() -> Self {
        Self {
            dim_count: 2,
            width: 3,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl TensorConfig {
    pub fn new(dim_count: usize, width: usize) -> Self {
        Self {
            dim_count,
            width,
            ..Self::default()
        }
    }

    /// Smallest width-3 shape holding at least `blocks` blocks, with at
    /// least two axes.
    ///
    /// Width 3 keeps each line short while `dim_count` grows with the
    /// logarithm of the requested size, so a mutation touches
    /// `O(log blocks)` digests.
    pub fn for_capacity(blocks: usize) -> TensorResult<Self> {
        if blocks == 0 {
            return Err(TensorError::InvalidShape {
                dim_count: 0,
                width: SIZED_WIDTH,
                reason: "requested capacity must be positive",
            });
        }
        let mut dim_count = 2;
        loop {
            let capacity = SIZED_WIDTH
                .checked_pow(dim_count as u32)
                .ok_or(TensorError::InvalidShape {
                    dim_count,
                    width: SIZED_WIDTH,
                    reason: "width^dim_count overflows the address space",
                })?;
            if capacity >= blocks {
                return Ok(Self::new(dim_count, SIZED_WIDTH));
            }
            dim_count += 1;
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(document: &str) -> TensorResult<Self> {
        toml::from_str(document).map_err(|e| TensorError::Config(e.to_string()))
    }

    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    /// Check the shape and limits, returning the validated space.
    pub fn validate(&self) -> TensorResult<CoordinateSpace> {
        let space = CoordinateSpace::new(self.dim_count, self.width)?;
        if self.max_payload_bytes == 0 {
            return Err(TensorError::Config(
                "max_payload_bytes must be positive".into(),
            ));
        }
        Ok(space)
    }
}
