//! Tamper-evident block storage with authenticated point erasure.
//!
//! A [`BlockTensor`] stores blocks in the cells of a fixed `width^dim_count`
//! grid. Every line of cells along every axis carries a digest over its
//! blocks, and every axis carries a summary over its lines. A write or an
//! erase refreshes only the `dim_count` lines through one cell, so its cost
//! grows with the number of axes rather than the number of stored blocks.
//!
//! This crate provides:
//! - [`Block`]: payload, timestamp, and digest of one cell
//! - [`LineDigestLedger`]: per-line and per-axis digests
//! - [`BlockTensor`]: the engine (`add`, `set`, `erase`, `get`, `verify`)
//! - [`TensorConfig`]: shape and payload ceiling, loadable from TOML
//! - [`IntegrityReport`]: result of a full recomputation pass
//! - [`TensorSnapshot`]: complete state for an external store

pub mod block;
pub mod config;
pub mod error;
pub mod ledger;
pub mod snapshot;
pub mod tensor;
pub mod validation;

pub use block::Block;
pub use config::{TensorConfig, DEFAULT_MAX_PAYLOAD_BYTES};
pub use error::{TensorError, TensorResult};
pub use ledger::{DigestSource, LineDigestLedger};
pub use snapshot::TensorSnapshot;
pub use tensor::BlockTensor;
pub use validation::{IntegrityReport, Violation, ViolationKind};
