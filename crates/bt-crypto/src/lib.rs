//! Cryptographic primitives for the block tensor.
//!
//! Provides domain-separated BLAKE3 hashing for the three digest layers of
//! the structure: blocks, lines, and axis summaries.
//!
//! All crypto operations wrap established libraries; no custom cryptography is involved.

pub mod hasher;

pub use hasher::ContentHasher;
