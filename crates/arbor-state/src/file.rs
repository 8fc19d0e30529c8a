use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use arbor_protocol::Address;

use crate::{MemoryTopology, StateError, TopologyStore};

/// On-disk form of the tree edges.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    parent: Option<Address>,
    children: Vec<Address>,
}

/// Topology that survives a restart.
///
/// Parent and children are written to a JSON file after every change and
/// reloaded on open. The digest cache stays in memory.
#[derive(Debug)]
pub struct FileTopology {
    path: PathBuf,
    inner: MemoryTopology,
    /// Serializes snapshot writes.
    write_lock: Mutex<()>,
}

impl FileTopology {
    /// Open the snapshot at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let snapshot = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| StateError::Io {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str::<Snapshot>(&raw).map_err(|source| StateError::Serialization {
                path: path.display().to_string(),
                source,
            })?
        } else {
            Snapshot::default()
        };

        tracing::debug!(
            path = %path.display(),
            parent = ?snapshot.parent,
            children = snapshot.children.len(),
            "Loaded topology snapshot"
        );

        let children: HashSet<Address> = snapshot.children.into_iter().collect();
        Ok(Self {
            path,
            inner: MemoryTopology::with_edges(snapshot.parent, children),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut children: Vec<Address> = self.inner.children().into_iter().collect();
        children.sort();
        let snapshot = Snapshot { parent: self.inner.parent(), children };
        if let Err(e) = write_snapshot(&self.path, &snapshot) {
            tracing::warn!(error = %e, "Failed to persist topology snapshot");
        }
    }
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StateError> {
    let io_err = |source| StateError::Io { path: path.display().to_string(), source };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(snapshot).map_err(|source| StateError::Serialization {
        path: path.display().to_string(),
        source,
    })?;
    // Readers never see a partially written snapshot.
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

impl TopologyStore for FileTopology {
    fn parent(&self) -> Option<Address> {
        self.inner.parent()
    }

    fn set_parent(&self, parent: Address) {
        self.inner.set_parent(parent);
        self.persist();
    }

    fn children(&self) -> HashSet<Address> {
        self.inner.children()
    }

    fn has_child(&self, child: &Address) -> bool {
        self.inner.has_child(child)
    }

    fn add_child(&self, child: Address) -> bool {
        let added = self.inner.add_child(child);
        if added {
            self.persist();
        }
        added
    }

    fn remove_child(&self, child: &Address) -> bool {
        let removed = self.inner.remove_child(child);
        if removed {
            self.persist();
        }
        removed
    }

    fn has_seen(&self, digest: &str) -> bool {
        self.inner.has_seen(digest)
    }

    fn mark_seen(&self, digest: &str) -> bool {
        self.inner.mark_seen(digest)
    }
}
