//! Refcounted watch registry and change-event router.
//!
//! # Architecture
//!
//! ```text
//! consumer --watch_file/watch_directory--> WatchFactory
//!                                            |
//!                        +-------------------+-------------------+
//!                        |                   |                   |
//!                  files collection   dirs collection    rDirs collection
//!                        |                   |                   |
//!                        +------ shared IdAllocator -------------+
//!
//! WatchFactory --createFileWatcher/createDirectoryWatcher/closeWatcher--> Session
//! Session --onWatchChange--> WatchFactory --> callbacks
//! ```

mod collection;
mod disposer;
mod error;
mod factory;
mod registry;

pub use collection::{CallbackSet, Subscribed, Unsubscribed, WatcherCollection};
pub use disposer::Disposer;
pub use error::WatchError;
pub use factory::WatchFactory;
pub use registry::{DirectoryWatcherCallback, FileWatcherCallback, Subscriber, WatchRegistry, WatchStats};
