//! The three watcher collections and the id counter they share.

use std::rc::Rc;

use crate::types::{CanonicalPath, FileWatcherEventKind, IdAllocator, WatchId, WatchType};

use super::collection::{Subscribed, Unsubscribed, WatcherCollection};

/// Callback invoked for file watch events.
pub type FileWatcherCallback = Rc<dyn Fn(&str, FileWatcherEventKind)>;

/// Callback invoked for directory watch events. Directory notifications carry
/// no event kind.
pub type DirectoryWatcherCallback = Rc<dyn Fn(&str)>;

/// A callback together with the collection it belongs to.
#[derive(Clone)]
pub enum Subscriber {
    File(FileWatcherCallback),
    Directory {
        recursive: bool,
        callback: DirectoryWatcherCallback,
    },
}

impl Subscriber {
    pub fn watch_type(&self) -> WatchType {
        match self {
            Subscriber::File(_) => WatchType::File,
            Subscriber::Directory { recursive, .. } => WatchType::for_directory(*recursive),
        }
    }

    /// Value of the `recursive` field in the create notification.
    pub fn recursive(&self) -> Option<bool> {
        match self {
            Subscriber::File(_) => None,
            Subscriber::Directory { recursive, .. } => Some(*recursive),
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Subscriber({})", self.watch_type())
    }
}

/// Counts of active watches, reported in logs and by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatchStats {
    pub files: usize,
    pub directories: usize,
    pub recursive_directories: usize,
    /// Number of ids handed out so far.
    pub allocated_ids: u64,
}

impl WatchStats {
    pub fn total(&self) -> usize {
        self.files + self.directories + self.recursive_directories
    }
}

/// All watch bookkeeping owned by one factory.
#[derive(Default)]
pub struct WatchRegistry {
    files: WatcherCollection<dyn Fn(&str, FileWatcherEventKind)>,
    directories: WatcherCollection<dyn Fn(&str)>,
    recursive_directories: WatcherCollection<dyn Fn(&str)>,
    ids: IdAllocator,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. `None` once the id space is exhausted.
    pub fn subscribe(&mut self, key: CanonicalPath, subscriber: &Subscriber) -> Option<Subscribed> {
        match subscriber {
            Subscriber::File(callback) => {
                self.files.subscribe(key, callback.clone(), &mut self.ids)
            }
            Subscriber::Directory {
                recursive,
                callback,
            } => {
                let collection = if *recursive {
                    &mut self.recursive_directories
                } else {
                    &mut self.directories
                };
                collection.subscribe(key, callback.clone(), &mut self.ids)
            }
        }
    }

    pub fn unsubscribe(
        &mut self,
        key: &CanonicalPath,
        id: WatchId,
        subscriber: &Subscriber,
    ) -> Unsubscribed {
        match subscriber {
            Subscriber::File(callback) => self.files.unsubscribe(key, id, callback),
            Subscriber::Directory {
                recursive,
                callback,
            } => self
                .directory_collection_mut(*recursive)
                .unsubscribe(key, id, callback),
        }
    }

    pub fn file_callbacks(&self, id: WatchId) -> Vec<FileWatcherCallback> {
        self.files.callbacks(id)
    }

    pub fn directory_callbacks(&self, id: WatchId, recursive: bool) -> Vec<DirectoryWatcherCallback> {
        if recursive {
            self.recursive_directories.callbacks(id)
        } else {
            self.directories.callbacks(id)
        }
    }

    pub fn has_file_callback(&self, id: WatchId, callback: &FileWatcherCallback) -> bool {
        self.files.is_subscribed(id, callback)
    }

    pub fn has_directory_callback(
        &self,
        id: WatchId,
        recursive: bool,
        callback: &DirectoryWatcherCallback,
    ) -> bool {
        if recursive {
            self.recursive_directories.is_subscribed(id, callback)
        } else {
            self.directories.is_subscribed(id, callback)
        }
    }

    /// Active id for a canonical path in the given collection.
    pub fn id_for(&self, watch_type: WatchType, key: &CanonicalPath) -> Option<WatchId> {
        match watch_type {
            WatchType::File => self.files.id_for(key),
            WatchType::Directory => self.directories.id_for(key),
            WatchType::RecursiveDirectory => self.recursive_directories.id_for(key),
        }
    }

    pub fn stats(&self) -> WatchStats {
        WatchStats {
            files: self.files.len(),
            directories: self.directories.len(),
            recursive_directories: self.recursive_directories.len(),
            allocated_ids: self.ids.allocated(),
        }
    }

    fn directory_collection_mut(&mut self, recursive: bool) -> &mut WatcherCollection<dyn Fn(&str)> {
        if recursive {
            &mut self.recursive_directories
        } else {
            &mut self.directories
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(recursive: bool) -> Subscriber {
        Subscriber::Directory {
            recursive,
            callback: Rc::new(|_: &str| {}),
        }
    }

    #[test]
    fn test_counter_shared_across_collections() {
        let mut registry = WatchRegistry::new();
        let file = Subscriber::File(Rc::new(|_: &str, _: FileWatcherEventKind| {}));

        let a = registry.subscribe(CanonicalPath::new("/p"), &file).unwrap();
        let b = registry.subscribe(CanonicalPath::new("/p"), &dir(false)).unwrap();
        let c = registry.subscribe(CanonicalPath::new("/p"), &dir(true)).unwrap();

        assert_eq!(a.id.value(), 1);
        assert_eq!(b.id.value(), 2);
        assert_eq!(c.id.value(), 3);
        assert!(a.created && b.created && c.created);

        let stats = registry.stats();
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.allocated_ids, 3);
    }

    #[test]
    fn test_recursive_and_flat_directories_are_isolated() {
        let mut registry = WatchRegistry::new();
        let flat = dir(false);
        let deep = dir(true);

        let flat_id = registry.subscribe(CanonicalPath::new("/d"), &flat).unwrap().id;
        let deep_id = registry.subscribe(CanonicalPath::new("/d"), &deep).unwrap().id;

        assert_ne!(flat_id, deep_id);
        assert_eq!(registry.directory_callbacks(flat_id, false).len(), 1);
        assert!(registry.directory_callbacks(flat_id, true).is_empty());
        assert!(registry.directory_callbacks(deep_id, false).is_empty());

        assert_eq!(
            registry.unsubscribe(&CanonicalPath::new("/d"), flat_id, &flat),
            Unsubscribed::Released
        );
        assert_eq!(
            registry.id_for(WatchType::RecursiveDirectory, &CanonicalPath::new("/d")),
            Some(deep_id)
        );
    }

    #[test]
    fn test_subscriber_watch_type() {
        assert_eq!(dir(true).watch_type(), WatchType::RecursiveDirectory);
        assert_eq!(dir(false).recursive(), Some(false));
        let file = Subscriber::File(Rc::new(|_: &str, _: FileWatcherEventKind| {}));
        assert_eq!(file.watch_type(), WatchType::File);
        assert_eq!(file.recursive(), None);
    }
}
