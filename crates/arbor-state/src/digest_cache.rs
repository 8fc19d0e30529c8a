use std::collections::HashSet;

/// Set of command digests this node has already accepted.
///
/// Grows for the lifetime of the process; nothing is evicted.
// TODO: bound the cache (LRU or time window) for long-lived nodes.
#[derive(Debug, Default)]
pub struct DigestCache {
    seen: HashSet<String>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.seen.contains(digest)
    }

    /// Record the digest. Returns `false` if it was already present.
    pub fn check_and_insert(&mut self, digest: &str) -> bool {
        if self.seen.contains(digest) {
            return false;
        }
        self.seen.insert(digest.to_string())
    }

    /// Returns the number of tracked digests (for testing/monitoring).
    pub fn size(&self) -> usize {
        self.seen.len()
    }
}
