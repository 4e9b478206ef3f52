//! Per-kind watcher collection with identity-keyed callback sets.
//!
//! A collection maps each canonical path to one watch id, and each id to the
//! callbacks subscribed to it. The two maps are always updated together: an
//! id has callbacks if and only if some path maps to it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::types::{CanonicalPath, IdAllocator, WatchId};

/// Insertion-ordered set of callbacks compared by `Rc` pointer identity.
pub struct CallbackSet<F: ?Sized> {
    entries: IndexMap<usize, Rc<F>>,
}

impl<F: ?Sized> CallbackSet<F> {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    fn identity(callback: &Rc<F>) -> usize {
        Rc::as_ptr(callback) as *const () as usize
    }

    /// Add a callback. Returns false if this exact callback was already present.
    pub fn insert(&mut self, callback: Rc<F>) -> bool {
        let key = Self::identity(&callback);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, callback);
        true
    }

    /// Remove a callback. Returns false if it was not present.
    pub fn remove(&mut self, callback: &Rc<F>) -> bool {
        self.entries
            .shift_remove(&Self::identity(callback))
            .is_some()
    }

    pub fn contains(&self, callback: &Rc<F>) -> bool {
        self.entries.contains_key(&Self::identity(callback))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clone the current members so they can be invoked without holding a borrow.
    pub fn snapshot(&self) -> Vec<Rc<F>> {
        self.entries.values().cloned().collect()
    }
}

impl<F: ?Sized> Default for CallbackSet<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of adding a subscriber to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscribed {
    pub id: WatchId,
    /// True when this subscription activated the watch.
    pub created: bool,
}

/// Result of removing a subscriber from a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsubscribed {
    /// The id or callback was already gone.
    Missing,
    /// Other subscribers still hold the watch.
    Remaining(usize),
    /// The last subscriber left and the watch was torn down.
    Released,
}

/// Watches of one kind (files, directories, or recursive directories).
pub struct WatcherCollection<F: ?Sized> {
    path_to_id: HashMap<CanonicalPath, WatchId>,
    id_to_callbacks: HashMap<WatchId, CallbackSet<F>>,
}

impl<F: ?Sized> WatcherCollection<F> {
    pub fn new() -> Self {
        Self {
            path_to_id: HashMap::new(),
            id_to_callbacks: HashMap::new(),
        }
    }

    pub fn subscribe(
        &mut self,
        key: CanonicalPath,
        callback: Rc<F>,
        ids: &mut IdAllocator,
    ) -> Option<Subscribed> {
        let id = match self.path_to_id.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => *entry.insert(ids.allocate()?),
        };

        let (callbacks, created) = match self.id_to_callbacks.entry(id) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(CallbackSet::new()), true),
        };
        callbacks.insert(callback);

        Some(Subscribed { id, created })
    }

    pub fn unsubscribe(&mut self, key: &CanonicalPath, id: WatchId, callback: &Rc<F>) -> Unsubscribed {
        let Some(callbacks) = self.id_to_callbacks.get_mut(&id) else {
            return Unsubscribed::Missing;
        };
        if !callbacks.remove(callback) {
            return Unsubscribed::Missing;
        }
        if !callbacks.is_empty() {
            return Unsubscribed::Remaining(callbacks.len());
        }

        self.id_to_callbacks.remove(&id);
        self.path_to_id.remove(key);
        Unsubscribed::Released
    }

    /// Callbacks currently subscribed to `id`; empty for unknown ids.
    pub fn callbacks(&self, id: WatchId) -> Vec<Rc<F>> {
        self.id_to_callbacks
            .get(&id)
            .map(CallbackSet::snapshot)
            .unwrap_or_default()
    }

    /// Whether `callback` is still subscribed to `id`.
    pub fn is_subscribed(&self, id: WatchId, callback: &Rc<F>) -> bool {
        self.id_to_callbacks
            .get(&id)
            .is_some_and(|callbacks| callbacks.contains(callback))
    }

    pub fn id_for(&self, key: &CanonicalPath) -> Option<WatchId> {
        self.path_to_id.get(key).copied()
    }

    pub fn subscriber_count(&self, id: WatchId) -> usize {
        self.id_to_callbacks.get(&id).map_or(0, CallbackSet::len)
    }

    /// Number of active watches.
    pub fn len(&self) -> usize {
        self.path_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_to_id.is_empty()
    }
}

impl<F: ?Sized> Default for WatcherCollection<F> {
    fn default() -> Self {
        Self::new()
    }
}
