//! Foundation types for the block tensor.
//!
//! Every other `bt-*` crate depends on `bt-types`.
//!
//! # Key Types
//!
//! - [`Digest`]: Fixed-width 256-bit digest of a block, a line, or an axis
//! - [`Coordinate`]: Position of one cell in the N-dimensional grid

pub mod coordinate;
pub mod digest;
pub mod error;

pub use coordinate::Coordinate;
pub use digest::{Digest, DIGEST_LEN};
pub use error::TypeError;
