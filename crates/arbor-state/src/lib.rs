//! Arbor State - topology store shared by every connection handler
//!
//! Holds the node's single parent, its set of children and the set of
//! command digests already executed. Two backends implement the same
//! [`TopologyStore`] capability set: [`MemoryTopology`] and
//! [`FileTopology`].

pub mod digest_cache;
pub mod error;
pub mod file;
pub mod memory;

use std::collections::HashSet;

use arbor_protocol::Address;

pub use digest_cache::DigestCache;
pub use error::StateError;
pub use file::FileTopology;
pub use memory::MemoryTopology;

/// Concurrency-safe repository of tree edges and seen commands.
///
/// Every operation is atomic with respect to the others. None of them
/// fail: backends that persist state log write failures and keep serving
/// from memory.
pub trait TopologyStore: Send + Sync {
    /// Current parent; `None` means this node is the root.
    fn parent(&self) -> Option<Address>;

    fn set_parent(&self, parent: Address);

    /// Point-in-time copy of the children set.
    fn children(&self) -> HashSet<Address>;

    fn has_child(&self, child: &Address) -> bool;

    /// Returns `true` if the child was not already present.
    fn add_child(&self, child: Address) -> bool;

    /// Returns `true` if the child was present. Absent children are a no-op.
    fn remove_child(&self, child: &Address) -> bool;

    fn has_seen(&self, digest: &str) -> bool;

    /// Atomically record a digest. Returns `true` if it was not seen before.
    fn mark_seen(&self, digest: &str) -> bool;
}
