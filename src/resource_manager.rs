//! Resource lifecycle manager: generic per-node state tables, keyed by node
//! id, generalized into one reusable table type. Each executor family that
//! owns side-effect state registers a [`ResourceTable<T>`] here; the manager
//! invokes `dispose_node`/`dispose_all`/`gc` uniformly across every
//! registered family without needing to know `T`.

use crate::graph::NodeId;
use bevy_ecs::prelude::Resource;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Per-family table of node-keyed state, with an optional per-entry
/// disposal callback (e.g. drop a GPU texture, cancel a reconnect timer).
pub struct ResourceTable<T> {
    entries: DashMap<NodeId, T>,
    on_dispose: Option<Box<dyn Fn(&T) + Send + Sync>>,
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            on_dispose: None,
        }
    }
}

impl<T> ResourceTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dispose(on_dispose: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self {
            entries: DashMap::new(),
            on_dispose: Some(Box::new(on_dispose)),
        }
    }

    pub fn insert(&self, node_id: NodeId, value: T) {
        if let Some((_, old)) = self.entries.remove(&node_id) {
            self.dispose_value(&old);
        }
        self.entries.insert(node_id, value);
    }

    pub fn get(&self, node_id: NodeId) -> Option<dashmap::mapref::one::Ref<'_, NodeId, T>> {
        self.entries.get(&node_id)
    }

    pub fn get_mut(&self, node_id: NodeId) -> Option<dashmap::mapref::one::RefMut<'_, NodeId, T>> {
        self.entries.get_mut(&node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.entries.contains_key(&node_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<NodeId> {
        self.entries.iter().map(|e| *e.key()).collect()
    }

    fn dispose_value(&self, value: &T) {
        if let Some(cb) = &self.on_dispose {
            cb(value);
        }
    }
}

/// Type-erased disposal surface the manager dispatches across uniformly.
pub trait Disposable: Send + Sync {
    fn dispose_node(&self, node_id: NodeId);
    fn dispose_all(&self);
    /// Drops any entry whose key is not in `valid`.
    fn gc(&self, valid: &HashSet<NodeId>);
    fn len(&self) -> usize;
}

impl<T: Send + Sync + 'static> Disposable for ResourceTable<T> {
    fn dispose_node(&self, node_id: NodeId) {
        if let Some((_, value)) = self.entries.remove(&node_id) {
            self.dispose_value(&value);
        }
    }

    fn dispose_all(&self) {
        let keys: Vec<NodeId> = self.entries.iter().map(|e| *e.key()).collect();
        for key in keys {
            self.dispose_node(key);
        }
    }

    fn gc(&self, valid: &HashSet<NodeId>) {
        let stale: Vec<NodeId> = self
            .entries
            .iter()
            .map(|e| *e.key())
            .filter(|id| !valid.contains(id))
            .collect();
        for id in stale {
            self.dispose_node(id);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The manager itself: a registry of per-family `Disposable` handles,
/// invoked by the graph model on node removal and by the scheduler's `stop()`.
#[derive(Resource, Default, Clone)]
pub struct ResourceManager {
    families: Arc<DashMap<String, Arc<dyn Disposable>>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_family(&self, name: impl Into<String>, table: Arc<dyn Disposable>) {
        self.families.insert(name.into(), table);
    }

    pub fn dispose_node(&self, node_id: NodeId) {
        for family in self.families.iter() {
            family.value().dispose_node(node_id);
        }
    }

    pub fn dispose_all(&self) {
        tracing::info!("resource manager: disposing all families");
        for family in self.families.iter() {
            family.value().dispose_all();
        }
    }

    /// Periodic GC sweep: disposes state for any node id not in the
    /// currently valid set, across every family.
    pub fn gc(&self, valid: &HashSet<NodeId>) {
        for family in self.families.iter() {
            family.value().gc(valid);
        }
    }

    pub fn family_len(&self, name: &str) -> Option<usize> {
        self.families.get(name).map(|f| f.value().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispose_node_removes_entry_and_runs_callback() {
        let disposed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let d2 = disposed.clone();
        let table: Arc<ResourceTable<String>> =
            Arc::new(ResourceTable::with_dispose(move |_| {
                d2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }));
        let manager = ResourceManager::new();
        manager.register_family("shader", table.clone());

        let node = NodeId::new();
        table.insert(node, "program".to_string());
        assert_eq!(manager.family_len("shader"), Some(1));

        manager.dispose_node(node);
        assert_eq!(manager.family_len("shader"), Some(0));
        assert_eq!(disposed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn gc_sweeps_unknown_ids() {
        let table: Arc<ResourceTable<i32>> = Arc::new(ResourceTable::new());
        let manager = ResourceManager::new();
        manager.register_family("timers", table.clone());

        let keep = NodeId::new();
        let drop_me = NodeId::new();
        table.insert(keep, 1);
        table.insert(drop_me, 2);

        let mut valid = HashSet::new();
        valid.insert(keep);
        manager.gc(&valid);

        assert!(table.contains(keep));
        assert!(!table.contains(drop_me));
    }

    #[test]
    fn dispose_all_clears_every_family() {
        let table: Arc<ResourceTable<i32>> = Arc::new(ResourceTable::new());
        let manager = ResourceManager::new();
        manager.register_family("x", table.clone());
        table.insert(NodeId::new(), 1);
        table.insert(NodeId::new(), 2);
        manager.dispose_all();
        assert_eq!(table.len(), 0);
    }
}
