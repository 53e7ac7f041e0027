use bt_crypto::ContentHasher;
use bt_types::Digest;
use serde::{Deserialize, Serialize};

use crate::error::{TensorError, TensorResult};

/// The unit of stored data: payload, timestamp, and a digest of both.
///
/// Outside a mutation in progress, `digest == H(timestamp ‖ payload)`.
/// "Unwritten" and "erased" are the same state: an empty payload. There is
/// no tombstone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    timestamp_ms: u64,
    payload: Vec<u8>,
    digest: Digest,
}

impl Block {
    /// Build a block, rejecting payloads above `max_payload_bytes`.
    pub fn create(
        timestamp_ms: u64,
        payload: Vec<u8>,
        max_payload_bytes: usize,
    ) -> TensorResult<Self> {
        check_payload(payload.len(), max_payload_bytes)?;
        Ok(Self::sealed(timestamp_ms, payload))
    }

    /// An empty-payload block, the initial content of every cell.
    pub fn empty(timestamp_ms: u64) -> Self {
        Self::sealed(timestamp_ms, Vec::new())
    }

    /// Reassemble a block from stored parts without recomputing the digest.
    pub fn from_parts(timestamp_ms: u64, payload: Vec<u8>, digest: Digest) -> Self {
        Self {
            timestamp_ms,
            payload,
            digest,
        }
    }

    fn sealed(timestamp_ms: u64, payload: Vec<u8>) -> Self {
        let digest = ContentHasher::block_digest(timestamp_ms, &payload);
        Self {
            timestamp_ms,
            payload,
            digest,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The stored digest, which is not re-derived here.
    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// `true` when the block is unwritten or erased.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Digest derived from the current timestamp and payload.
    pub fn recompute_digest(&self) -> Digest {
        ContentHasher::block_digest(self.timestamp_ms, &self.payload)
    }

    /// `true` if the stored digest matches the content.
    pub fn is_intact(&self) -> bool {
        self.digest == self.recompute_digest()
    }

    /// Replace timestamp and payload and reseal, returning the old payload.
    ///
    /// Callers hold the block exclusively, so no reader sees a stale digest.
    /// The payload size must already have been checked.
    pub fn overwrite(&mut self, timestamp_ms: u64, payload: Vec<u8>) -> Vec<u8> {
        self.timestamp_ms = timestamp_ms;
        let previous = std::mem::replace(&mut self.payload, payload);
        self.digest = self.recompute_digest();
        previous
    }

    #[cfg(test)]
    pub(crate) fn tamper_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }

    #[cfg(test)]
    pub(crate) fn tamper_digest(&mut self, digest: Digest) {
        self.digest = digest;
    }
}

/// Reject payloads longer than `limit` bytes.
pub fn check_payload(size: usize, limit: usize) -> TensorResult<()> {
    if size > limit {
        return Err(TensorError::PayloadTooLarge { size, limit });
    }
    Ok(())
}
