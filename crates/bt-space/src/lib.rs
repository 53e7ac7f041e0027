//! Coordinate space and placement policy for the block tensor.
//!
//! - [`CoordinateSpace`]: fixed-shape `width^dim_count` grid; converts
//!   between linear indices and coordinates (axis 0 most significant) and
//!   enumerates lines.
//! - [`Grid`]: backing storage laid out over a [`CoordinateSpace`].
//! - [`PlacementPolicy`]: the immutable bijection from sequential block
//!   numbers to coordinates, assigned in breadth-first ("shell") order from
//!   the origin.
//!
//! Everything here is pure index arithmetic: no hashing, no locking.

pub mod error;
pub mod grid;
pub mod placement;
pub mod space;

pub use error::{SpaceError, SpaceResult};
pub use grid::Grid;
pub use placement::PlacementPolicy;
pub use space::{CoordinateSpace, LineId, MIN_DIM_COUNT};
