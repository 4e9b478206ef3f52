use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// Identifier of one active watch on one canonical path within one collection.
///
/// Zero is never a valid id, so a missing watch can never be confused with
/// an allocated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchId(NonZeroU64);

impl WatchId {
    pub fn new(value: u64) -> Option<Self> {
        NonZeroU64::new(value).map(Self)
    }

    /// Convert a wire value. Zero is not an id.
    pub fn from_wire(value: u64) -> Option<Self> {
        Self::new(value)
    }

    pub fn value(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source shared by every watcher collection of one factory.
///
/// Ids are never recycled, even after the watch they named is closed. Once
/// `u64::MAX` has been handed out the allocator is exhausted and returns
/// `None` instead of repeating an id.
#[derive(Debug)]
pub struct IdAllocator {
    next: Option<NonZeroU64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: Some(NonZeroU64::MIN),
        }
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: NonZeroU64) -> Self {
        Self { next: Some(next) }
    }

    pub fn allocate(&mut self) -> Option<WatchId> {
        let id = self.next?;
        self.next = id.checked_add(1);
        Some(WatchId(id))
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next.map_or(u64::MAX, |next| next.get() - 1)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Path normalized by the session, used as the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which collection a watch lives in. Serialized as the `type` of a
/// `closeWatcher` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WatchType {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir")]
    Directory,
    #[serde(rename = "rDir")]
    RecursiveDirectory,
}

impl WatchType {
    pub fn for_directory(recursive: bool) -> Self {
        if recursive {
            WatchType::RecursiveDirectory
        } else {
            WatchType::Directory
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchType::File => "file",
            WatchType::Directory => "dir",
            WatchType::RecursiveDirectory => "rDir",
        }
    }
}

impl fmt::Display for WatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event kind handed to file watcher callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileWatcherEventKind {
    Created = 0,
    Changed = 1,
    Deleted = 2,
}

/// Event type reported by the external change source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchEventType {
    Create,
    Delete,
    Update,
}

impl WatchEventType {
    pub fn file_event_kind(self) -> FileWatcherEventKind {
        match self {
            WatchEventType::Create => FileWatcherEventKind::Created,
            WatchEventType::Delete => FileWatcherEventKind::Deleted,
            WatchEventType::Update => FileWatcherEventKind::Changed,
        }
    }

    /// Directory watchers only hear about entries appearing or disappearing.
    pub fn reaches_directories(self) -> bool {
        !matches!(self, WatchEventType::Update)
    }
}
