//! Per-key cache observers
//!
//! Observers are notified synchronously on the notifying thread and their
//! outcome is not awaited or inspected. A key with no registrations simply
//! has zero observers.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::requests::ResourceId;

/// Receives change and deletion notices for the keys it registered on
pub trait CacheObserver: Send + Sync {
    fn on_resource_change(&self, id: &ResourceId, value: &str);

    fn on_resource_deleted(&self, id: &ResourceId);
}

fn same_observer(a: &Arc<dyn CacheObserver>, b: &Arc<dyn CacheObserver>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Fan-out lists of observers keyed by resource id
#[derive(Default)]
pub struct ObserverRegistry {
    observers: DashMap<ResourceId, Vec<Arc<dyn CacheObserver>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` for `id`; registering the same observer twice is a no-op
    pub fn register(&self, id: &ResourceId, observer: Arc<dyn CacheObserver>) {
        let mut entry = self.observers.entry(id.clone()).or_default();
        if !entry.iter().any(|existing| same_observer(existing, &observer)) {
            entry.push(observer);
        }
    }

    pub fn unregister(&self, id: &ResourceId, observer: &Arc<dyn CacheObserver>) {
        if let Some(mut entry) = self.observers.get_mut(id) {
            entry.retain(|existing| !same_observer(existing, observer));
        }
    }

    pub fn unregister_from_all(&self, observer: &Arc<dyn CacheObserver>) {
        for mut entry in self.observers.iter_mut() {
            entry.retain(|existing| !same_observer(existing, observer));
        }
    }

    pub fn observer_count(&self, id: &ResourceId) -> usize {
        self.observers.get(id).map(|entry| entry.len()).unwrap_or(0)
    }

    // Snapshot so no map shard stays locked while observers run.
    fn snapshot(&self, id: &ResourceId) -> Vec<Arc<dyn CacheObserver>> {
        self.observers
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn notify_change(&self, id: &ResourceId, value: &str) {
        let observers = self.snapshot(id);
        debug!(resource_id = %id, observers = observers.len(), "Notifying cache change");
        for observer in observers {
            observer.on_resource_change(id, value);
        }
    }

    pub fn notify_deletion(&self, id: &ResourceId) {
        let observers = self.snapshot(id);
        debug!(resource_id = %id, observers = observers.len(), "Notifying cache deletion");
        for observer in observers {
            observer.on_resource_deleted(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        changes: Mutex<Vec<(String, String)>>,
        deletions: Mutex<Vec<String>>,
    }

    impl CacheObserver for RecordingObserver {
        fn on_resource_change(&self, id: &ResourceId, value: &str) {
            self.changes.lock().push((id.to_string(), value.to_string()));
        }

        fn on_resource_deleted(&self, id: &ResourceId) {
            self.deletions.lock().push(id.to_string());
        }
    }

    #[test]
    fn test_missing_key_has_zero_observers() {
        let registry = ObserverRegistry::new();
        let id = ResourceId::from("nobody");
        assert_eq!(registry.observer_count(&id), 0);
        registry.notify_change(&id, "ignored");
        registry.notify_deletion(&id);
    }

    #[test]
    fn test_register_notify_unregister() {
        let registry = ObserverRegistry::new();
        let id = ResourceId::from("feeds/1");
        let recorder = Arc::new(RecordingObserver::default());
        let observer: Arc<dyn CacheObserver> = recorder.clone();

        registry.register(&id, Arc::clone(&observer));
        registry.register(&id, Arc::clone(&observer));
        assert_eq!(registry.observer_count(&id), 1);

        registry.notify_change(&id, "{\"v\":1}");
        registry.notify_deletion(&id);
        assert_eq!(
            *recorder.changes.lock(),
            vec![("feeds/1".to_string(), "{\"v\":1}".to_string())]
        );
        assert_eq!(*recorder.deletions.lock(), vec!["feeds/1".to_string()]);

        registry.unregister(&id, &observer);
        registry.notify_change(&id, "{\"v\":2}");
        assert_eq!(recorder.changes.lock().len(), 1);
    }

    #[test]
    fn test_unregister_from_all_keys() {
        let registry = ObserverRegistry::new();
        let first = ResourceId::from("a");
        let second = ResourceId::from("b");
        let observer: Arc<dyn CacheObserver> = Arc::new(RecordingObserver::default());
        let other: Arc<dyn CacheObserver> = Arc::new(RecordingObserver::default());

        registry.register(&first, Arc::clone(&observer));
        registry.register(&second, Arc::clone(&observer));
        registry.register(&second, Arc::clone(&other));

        registry.unregister_from_all(&observer);

        assert_eq!(registry.observer_count(&first), 0);
        assert_eq!(registry.observer_count(&second), 1);
    }
}
