use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use batch_logging::batch_trace;

/// Identifier of a display handle, unique within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    live: BTreeSet<u64>,
}

/// Hands out display handles and tracks which ones are still alive.
///
/// Clones share the same bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh handle. It is released when its last clone is dropped.
    pub fn allocate(&self) -> DisplayHandle {
        let id = {
            let mut inner = lock(&self.inner);
            inner.next_id += 1;
            let id = inner.next_id;
            inner.live.insert(id);
            id
        };
        batch_trace!("allocated display handle {}", id);
        DisplayHandle {
            guard: Arc::new(HandleGuard {
                id: HandleId(id),
                registry: Arc::clone(&self.inner),
            }),
        }
    }

    pub fn live_count(&self) -> usize {
        lock(&self.inner).live.len()
    }

    pub fn is_live(&self, id: HandleId) -> bool {
        lock(&self.inner).live.contains(&id.0)
    }
}

impl PartialEq for HandleRegistry {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for HandleRegistry {}

#[derive(Debug)]
struct HandleGuard {
    id: HandleId,
    registry: Arc<Mutex<RegistryInner>>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        lock(&self.registry).live.remove(&self.id.0);
        batch_trace!("released display handle {}", self.id);
    }
}

/// A local reference that lets a view render a blob without copying it.
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    guard: Arc<HandleGuard>,
}

impl DisplayHandle {
    pub fn id(&self) -> HandleId {
        self.guard.id
    }

    pub fn uri(&self) -> String {
        format!("blob:image-batch/{}", self.guard.id)
    }
}

impl PartialEq for DisplayHandle {
    fn eq(&self, other: &Self) -> bool {
        self.guard.id == other.guard.id
    }
}

impl Eq for DisplayHandle {}

fn lock(inner: &Mutex<RegistryInner>) -> MutexGuard<'_, RegistryInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_released_when_last_clone_drops() {
        let registry = HandleRegistry::new();
        let handle = registry.allocate();
        let copy = handle.clone();
        let id = handle.id();

        drop(handle);
        assert!(registry.is_live(id));

        drop(copy);
        assert!(!registry.is_live(id));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn ids_are_never_reused() {
        let registry = HandleRegistry::new();
        let first = registry.allocate().id();
        let second = registry.allocate().id();
        assert_ne!(first, second);
        assert_eq!(registry.allocate().uri(), "blob:image-batch/3");
    }
}
