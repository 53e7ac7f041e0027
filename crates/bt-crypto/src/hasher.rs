use bt_types::Digest;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a block digest can never collide with a line digest built
/// from the same bytes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for block content (`timestamp ‖ payload`).
    pub const BLOCK: Self = Self {
        domain: "bt-block-v1",
    };
    /// Hasher for a line: the concatenated block digests along one axis.
    pub const LINE: Self = Self {
        domain: "bt-line-v1",
    };
    /// Hasher for an axis summary: the concatenated line digests of one axis.
    pub const AXIS: Self = Self {
        domain: "bt-axis-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        self.hash_parts([data])
    }

    /// Hash the concatenation of `parts` with domain separation, without
    /// materialising the concatenated buffer.
    pub fn hash_parts<'a, I>(&self, parts: I) -> Digest
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut hasher = self.start();
        for part in parts {
            hasher.update(part);
        }
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a sequence of digests in order (line and axis-summary digests).
    pub fn hash_digests<'a, I>(&self, digests: I) -> Digest
    where
        I: IntoIterator<Item = &'a Digest>,
    {
        self.hash_parts(digests.into_iter().map(|d| &d.as_bytes()[..]))
    }

    /// Digest of a block: big-endian timestamp followed by the payload.
    ///
    /// An empty payload still yields a digest that depends on the timestamp,
    /// so "known empty" is always distinguishable from an untouched slot.
    pub fn block_digest(timestamp_ms: u64, payload: &[u8]) -> Digest {
        Self::BLOCK.hash_parts([&timestamp_ms.to_be_bytes()[..], payload])
    }

    fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }
}
