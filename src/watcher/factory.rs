//! Watch factory: session binding, subscription, and event routing.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value;

use crate::protocol::{
    HandlerResponse, Request, WATCH_CHANGE_ACK, WATCH_CHANGE_COMMAND, WatchChangeArgs,
    WatcherNotification,
};
use crate::session::{ProtocolHandler, Session, same_session};
use crate::types::{WatchEventType, WatchId};

use super::disposer::Disposer;
use super::error::WatchError;
use super::registry::{
    DirectoryWatcherCallback, FileWatcherCallback, Subscriber, WatchRegistry, WatchStats,
};

/// State shared between a factory, its disposers, and its request handler.
pub(crate) struct FactoryState {
    pub(crate) session: Option<Rc<dyn Session>>,
    pub(crate) registry: WatchRegistry,
}

/// Hands out deduplicated watches and routes change events to them.
///
/// One factory owns three watcher collections and the id counter they share.
/// The first subscriber to a path makes the factory ask the session to create
/// a watcher; the last disposer to close makes it ask the session to close
/// it. Everything runs on one thread; callbacks are invoked synchronously.
///
/// ```ignore
/// let session: Rc<dyn Session> = Rc::new(MemorySession::default());
/// let factory = WatchFactory::new();
/// factory.create(Some(session))?;
///
/// let watcher = factory.watch_file("/x/a.ts", Rc::new(|path: &str, kind| {
///     println!("{path} {kind:?}");
/// }))?;
/// watcher.close();
/// ```
#[derive(Clone)]
pub struct WatchFactory {
    state: Rc<RefCell<FactoryState>>,
}

impl WatchFactory {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(FactoryState {
                session: None,
                registry: WatchRegistry::new(),
            })),
        }
    }

    /// Plugin entry point: bind `session` and register the `onWatchChange`
    /// handler on it.
    ///
    /// A handler left over from an earlier binding makes registration fail;
    /// that failure is ignored.
    pub fn create(&self, session: Option<Rc<dyn Session>>) -> Result<(), WatchError> {
        let session = session.ok_or(WatchError::SessionNotSupplied)?;
        self.bind_session(session.clone());

        match session.add_protocol_handler(WATCH_CHANGE_COMMAND, self.watch_change_handler()) {
            Ok(()) => crate::log_event!("factory", "Added command for onWatchChange"),
            Err(e) => crate::debug_event!("factory", "handler already registered", "{e}"),
        }
        Ok(())
    }

    /// Bind the session used for canonicalization and notifications.
    ///
    /// Rebinding the same session is a no-op. A different session is
    /// reported and ignored; the first one stays bound.
    pub fn set_session(&self, session: Option<Rc<dyn Session>>) -> Result<(), WatchError> {
        let session = session.ok_or(WatchError::SessionNotSupplied)?;
        self.bind_session(session);
        Ok(())
    }

    fn bind_session(&self, session: Rc<dyn Session>) {
        let mut state = self.state.borrow_mut();
        match &state.session {
            None => {
                state.session = Some(session);
                crate::debug_event!("factory", "session bound");
            }
            Some(bound) if same_session(bound, &session) => {}
            Some(_) => {
                tracing::error!("[factory] Another session in same module? Keeping the first one");
            }
        }
    }

    pub fn has_session(&self) -> bool {
        self.state.borrow().session.is_some()
    }

    /// Watch a file. `callback` receives every create, delete, and update.
    pub fn watch_file(&self, path: &str, callback: FileWatcherCallback) -> Result<Disposer, WatchError> {
        self.subscribe(path, Subscriber::File(callback))
    }

    /// Watch a directory. `callback` receives creates and deletes only.
    pub fn watch_directory(
        &self,
        path: &str,
        callback: DirectoryWatcherCallback,
        recursive: bool,
    ) -> Result<Disposer, WatchError> {
        self.subscribe(
            path,
            Subscriber::Directory {
                recursive,
                callback,
            },
        )
    }

    fn subscribe(&self, path: &str, subscriber: Subscriber) -> Result<Disposer, WatchError> {
        let session = self.session()?;
        let key = session.canonical_file_name(path);

        let subscribed = self
            .state
            .borrow_mut()
            .registry
            .subscribe(key.clone(), &subscriber)
            .ok_or(WatchError::IdsExhausted)?;

        if subscribed.created {
            crate::debug_event!(
                "factory",
                "create",
                "{} {key} id={}",
                subscriber.watch_type(),
                subscribed.id
            );
            let notification = match subscriber.recursive() {
                None => WatcherNotification::CreateFileWatcher {
                    path: path.to_string(),
                    id: subscribed.id,
                },
                Some(recursive) => WatcherNotification::CreateDirectoryWatcher {
                    path: path.to_string(),
                    id: subscribed.id,
                    recursive,
                },
            };
            session.event(notification);
        }

        Ok(Disposer::new(
            Rc::downgrade(&self.state),
            key,
            subscribed.id,
            subscriber,
        ))
    }

    fn session(&self) -> Result<Rc<dyn Session>, WatchError> {
        self.state
            .borrow()
            .session
            .clone()
            .ok_or(WatchError::SessionNotBound)
    }

    /// Deliver one change event to every callback watching `id`.
    ///
    /// File callbacks hear every event type; directory callbacks (recursive
    /// or not) never hear `update`. Ids with no watchers are ignored. A
    /// callback closed by an earlier callback of the same dispatch is skipped.
    pub fn on_watch_change(&self, id: u64, path: &str, event_type: WatchEventType) {
        let Some(id) = WatchId::from_wire(id) else {
            crate::debug_event!("factory", "ignored", "invalid id {id}");
            return;
        };

        let kind = event_type.file_event_kind();
        let files = self.state.borrow().registry.file_callbacks(id);
        for callback in files {
            let live = self.state.borrow().registry.has_file_callback(id, &callback);
            if live {
                callback(path, kind);
            }
        }

        if !event_type.reaches_directories() {
            return;
        }
        for recursive in [false, true] {
            let directories = self
                .state
                .borrow()
                .registry
                .directory_callbacks(id, recursive);
            for callback in directories {
                let live = self
                    .state
                    .borrow()
                    .registry
                    .has_directory_callback(id, recursive, &callback);
                if live {
                    callback(path);
                }
            }
        }
    }

    /// Handle the arguments of an `onWatchChange` request.
    ///
    /// Unknown ids are acknowledged. Arguments that do not deserialize (a
    /// missing field, an `eventType` other than `create`, `delete` or
    /// `update`, an `id` that is not a non-negative integer) are rejected
    /// with [`WatchError::InvalidRequest`], which the session reports as an
    /// unsuccessful response instead of the acknowledgement.
    pub fn handle_watch_change(&self, arguments: &Value) -> Result<HandlerResponse, WatchError> {
        let args = WatchChangeArgs::deserialize(arguments).map_err(|e| WatchError::InvalidRequest {
            reason: e.to_string(),
        })?;
        self.on_watch_change(args.id, &args.path, args.event_type);
        Ok(HandlerResponse::new(WATCH_CHANGE_ACK))
    }

    fn watch_change_handler(&self) -> ProtocolHandler {
        // Weak: the session owns this handler and the factory owns the session.
        let state = Rc::downgrade(&self.state);
        Rc::new(move |request: &Request| match state.upgrade() {
            Some(state) => WatchFactory { state }.handle_watch_change(&request.arguments),
            None => Ok(HandlerResponse::new(WATCH_CHANGE_ACK)),
        })
    }

    pub fn stats(&self) -> WatchStats {
        self.state.borrow().registry.stats()
    }
}

impl Default for WatchFactory {
    fn default() -> Self {
        Self::new()
    }
}
