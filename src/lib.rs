pub mod cli;
pub mod config;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod types;
pub mod watcher;

pub use config::Settings;
pub use protocol::{WatchChangeArgs, WatcherNotification};
pub use session::{Canonicalizer, MemorySession, Session, StdioSession};
pub use types::{CanonicalPath, FileWatcherEventKind, WatchEventType, WatchId, WatchType};
pub use watcher::{
    DirectoryWatcherCallback, Disposer, FileWatcherCallback, WatchError, WatchFactory, WatchStats,
};
