use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use arbor_protocol::Address;

use crate::{DigestCache, TopologyStore};

/// In-memory topology. Lives while the process runs.
///
/// Each field has its own lock; no invariant spans two fields.
#[derive(Debug, Default)]
pub struct MemoryTopology {
    parent: RwLock<Option<Address>>,
    children: RwLock<HashSet<Address>>,
    seen: Mutex<DigestCache>,
}

impl MemoryTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edges(parent: Option<Address>, children: HashSet<Address>) -> Self {
        Self {
            parent: RwLock::new(parent),
            children: RwLock::new(children),
            seen: Mutex::new(DigestCache::new()),
        }
    }

    fn read_children(&self) -> RwLockReadGuard<'_, HashSet<Address>> {
        self.children.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_children(&self) -> RwLockWriteGuard<'_, HashSet<Address>> {
        self.children.write().unwrap_or_else(|e| e.into_inner())
    }

    fn seen(&self) -> MutexGuard<'_, DigestCache> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TopologyStore for MemoryTopology {
    fn parent(&self) -> Option<Address> {
        *self.parent.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_parent(&self, parent: Address) {
        *self.parent.write().unwrap_or_else(|e| e.into_inner()) = Some(parent);
    }

    fn children(&self) -> HashSet<Address> {
        self.read_children().clone()
    }

    fn has_child(&self, child: &Address) -> bool {
        self.read_children().contains(child)
    }

    fn add_child(&self, child: Address) -> bool {
        self.write_children().insert(child)
    }

    fn remove_child(&self, child: &Address) -> bool {
        self.write_children().remove(child)
    }

    fn has_seen(&self, digest: &str) -> bool {
        self.seen().contains(digest)
    }

    fn mark_seen(&self, digest: &str) -> bool {
        self.seen().check_and_insert(digest)
    }
}
