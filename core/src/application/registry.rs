//! Registry of live executions.

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

/// A live task that can be told to stop.
pub trait ExecutionHandle: Send + Sync {
    /// Request cancellation. Must not block.
    fn cancel(&self);
}

/// Concurrency-safe map from execution ID to its live handle.
///
/// Each scheduler or supervisor owns its own registry; there is no shared
/// global instance. At most one handle exists per execution ID.
pub struct ExecutionRegistry<H> {
    handles: RwLock<HashMap<Uuid, H>>,
}

impl<H: ExecutionHandle> ExecutionRegistry<H> {
    pub fn new() -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Install a handle for `id`.
    ///
    /// A handle already registered under the same ID is cancelled while the
    /// lock is held, so no second start can slip in between. Returns true if
    /// a handle was replaced.
    pub fn install(&self, id: Uuid, handle: H) -> bool {
        let mut handles = self.handles.write();
        match handles.insert(id, handle) {
            Some(previous) => {
                previous.cancel();
                true
            }
            None => false,
        }
    }

    /// Run `f` against the handle for `id`, if any.
    pub fn with<R>(&self, id: Uuid, f: impl FnOnce(&H) -> R) -> Option<R> {
        self.handles.read().get(&id).map(f)
    }

    /// Remove and return the handle for `id` in one step.
    pub fn remove(&self, id: Uuid) -> Option<H> {
        self.handles.write().remove(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.handles.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Number of handles for which `f` holds.
    pub fn count(&self, f: impl Fn(&H) -> bool) -> usize {
        self.handles.read().values().filter(|h| f(*h)).count()
    }

    /// Cancel and drop every handle.
    pub fn cancel_all(&self) {
        let drained: Vec<H> = self.handles.write().drain().map(|(_, h)| h).collect();
        for handle in drained {
            handle.cancel();
        }
    }
}

impl<H: ExecutionHandle> Default for ExecutionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    struct Flag(Arc<AtomicBool>);

    impl ExecutionHandle for Flag {
        fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_install_cancels_previous() {
        let registry = ExecutionRegistry::new();
        let id = Uuid::new_v4();
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        assert!(!registry.install(id, Flag(first.clone())));
        assert!(registry.install(id, Flag(second.clone())));

        assert!(first.load(Ordering::SeqCst));
        assert!(!second.load(Ordering::SeqCst));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_load_and_delete() {
        let registry = ExecutionRegistry::new();
        let id = Uuid::new_v4();
        registry.install(id, Flag(Arc::new(AtomicBool::new(false))));

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_removal_yields_one_winner() {
        let registry = Arc::new(ExecutionRegistry::new());
        let id = Uuid::new_v4();
        registry.install(id, Flag(Arc::new(AtomicBool::new(false))));

        let winners: usize = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.remove(id).is_some())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
    }

    #[test]
    fn test_cancel_all() {
        let registry = ExecutionRegistry::new();
        let flags: Vec<_> = (0..3).map(|_| Arc::new(AtomicBool::new(false))).collect();
        for flag in &flags {
            registry.install(Uuid::new_v4(), Flag(flag.clone()));
        }

        registry.cancel_all();
        assert!(registry.is_empty());
        assert!(flags.iter().all(|f| f.load(Ordering::SeqCst)));
    }

    #[test]
    fn test_count_filters_handles() {
        let registry = ExecutionRegistry::new();
        let cancelled = Arc::new(AtomicBool::new(true));
        registry.install(Uuid::new_v4(), Flag(Arc::new(AtomicBool::new(false))));
        registry.install(Uuid::new_v4(), Flag(Arc::clone(&cancelled)));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.count(|f| !f.0.load(Ordering::SeqCst)), 1);
    }
}
