/// Errors from coordinate-space operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpaceError {
    /// The requested shape cannot be built. Raised before any allocation.
    #[error("invalid shape (dim_count={dim_count}, width={width}): {reason}")]
    InvalidShape {
        dim_count: usize,
        width: usize,
        reason: &'static str,
    },

    /// An index, axis, or coordinate component is outside its bounds.
    #[error("{what} {value} out of range [0, {bound})")]
    OutOfRange {
        what: &'static str,
        value: usize,
        bound: usize,
    },

    /// A coordinate or fixed-coordinate tuple has the wrong number of axes.
    #[error("expected {expected} coordinate components, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
}

impl SpaceError {
    /// `true` for every variant that rejects a caller-supplied position
    /// rather than a shape.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. } | Self::ArityMismatch { .. })
    }
}

/// Result alias for coordinate-space operations.
pub type SpaceResult<T> = Result<T, SpaceError>;
