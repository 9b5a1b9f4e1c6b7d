use crate::sync::RwLock;
use std::sync::Arc;

/// The shared byte buffer behind every handle to one in-memory file.
///
/// The buffer is published as an immutable snapshot behind an `Arc`. Readers
/// take the snapshot once and keep reading from it; a writer clones the
/// buffer first when anyone else still holds the snapshot, so completed reads
/// never observe a torn state.
pub struct MemoryObject {
    data: RwLock<Arc<Vec<u8>>>,
}

impl MemoryObject {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// The current snapshot. Immutable once returned.
    pub fn snapshot(&self) -> Arc<Vec<u8>> {
        self.data.read().clone()
    }

    /// Runs `f` against a uniquely owned buffer, cloning the snapshot first
    /// when it is shared. The mutation is visible to snapshots taken after
    /// `f` returns.
    pub fn with_writable<R>(&self, f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        let mut guard = self.data.write();
        f(Arc::make_mut(&mut guard))
    }

    /// Publishes a fresh, empty snapshot.
    pub fn reset(&self) {
        *self.data.write() = Arc::new(Vec::new());
    }

    /// Current length in bytes.
    pub fn len(&self) -> u64 {
        self.snapshot().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A new object sharing this one's current snapshot. Copy-on-write makes
    /// the share safe: whichever side writes first gets its own buffer.
    pub fn clone_object(&self) -> Self {
        Self {
            data: RwLock::new(self.snapshot()),
        }
    }
}

impl Default for MemoryObject {
    fn default() -> Self {
        Self::new()
    }
}
