use bt_space::SpaceError;

/// Errors produced by block tensor operations.
///
/// Integrity failures are not errors: they are reported by
/// [`BlockTensor::verify`](crate::BlockTensor::verify).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TensorError {
    /// Bad `dim_count`/`width`. The tensor is never created.
    #[error("invalid shape (dim_count={dim_count}, width={width}): {reason}")]
    InvalidShape {
        dim_count: usize,
        width: usize,
        reason: &'static str,
    },

    /// A block number, axis, or coordinate outside its bounds. No state was
    /// changed.
    #[error("{what} {value} out of range [0, {bound})")]
    OutOfRange {
        what: &'static str,
        value: usize,
        bound: usize,
    },

    /// A coordinate with the wrong number of components. No state was changed.
    #[error("expected {expected} coordinate components, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Payload above the configured ceiling. Rejected before any mutation.
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// A snapshot whose contents do not fit its declared shape.
    #[error("snapshot mismatch: {0}")]
    SnapshotMismatch(String),

    /// A configuration document that cannot be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TensorError {
    /// `true` for rejected positions (block numbers, axes, coordinates).
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. } | Self::ArityMismatch { .. })
    }
}

impl From<SpaceError> for TensorError {
    fn from(err: SpaceError) -> Self {
        match err {
            SpaceError::InvalidShape {
                dim_count,
                width,
                reason,
            } => Self::InvalidShape {
                dim_count,
                width,
                reason,
            },
            SpaceError::OutOfRange { what, value, bound } => Self::OutOfRange { what, value, bound },
            SpaceError::ArityMismatch { expected, actual } => {
                Self::ArityMismatch { expected, actual }
            }
        }
    }
}

/// Result alias for block tensor operations.
pub type TensorResult<T> = Result<T, TensorError>;
