//! Session capabilities the watch factory depends on.
//!
//! A session is whatever connects the factory to the external change source.
//! It provides three things, each as its own trait so tests can fake them
//! independently:
//!
//! - [`PathCanonicalizer`]: turns a raw path into the dedup key
//! - [`EventSink`]: fire-and-forget outbound notifications
//! - [`ProtocolHandlers`]: registration of inbound request handlers
//!
//! Two implementations ship with the crate: [`MemorySession`] for in-process
//! embedding, and [`StdioSession`] which speaks newline-delimited JSON.

mod stdio;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::protocol::{HandlerResponse, Request, Response, WatcherNotification};
use crate::types::CanonicalPath;
use crate::watcher::WatchError;

pub use stdio::{StdioSession, serve};

/// Handler for one inbound command.
pub type ProtocolHandler = Rc<dyn Fn(&Request) -> Result<HandlerResponse, WatchError>>;

pub trait PathCanonicalizer {
    /// Normalize a path into the key used for watch deduplication.
    fn canonical_file_name(&self, path: &str) -> CanonicalPath;
}

pub trait EventSink {
    /// Queue a notification for the change source. Never blocks, never fails.
    fn event(&self, notification: WatcherNotification);
}

pub trait ProtocolHandlers {
    /// Register the handler for `command`. Fails if one is already registered.
    fn add_protocol_handler(&self, command: &str, handler: ProtocolHandler) -> Result<(), WatchError>;
}

/// Everything the factory needs from a session.
pub trait Session: PathCanonicalizer + EventSink + ProtocolHandlers {}

impl<T: PathCanonicalizer + EventSink + ProtocolHandlers + ?Sized> Session for T {}

/// True if both handles point at the same session instance.
pub fn same_session(a: &Rc<dyn Session>, b: &Rc<dyn Session>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// Path normalization with optional case folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canonicalizer {
    case_sensitive: bool,
}

impl Canonicalizer {
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }

    pub fn canonicalize(&self, path: &str) -> CanonicalPath {
        if self.case_sensitive {
            CanonicalPath::new(path)
        } else {
            CanonicalPath::new(path.to_lowercase())
        }
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(crate::config::default_case_sensitive_paths())
    }
}

/// Command to handler table shared by the session implementations.
#[derive(Default)]
pub struct HandlerTable {
    handlers: RefCell<HashMap<String, ProtocolHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, command: &str, handler: ProtocolHandler) -> Result<(), WatchError> {
        let mut handlers = self.handlers.borrow_mut();
        if handlers.contains_key(command) {
            return Err(WatchError::HandlerAlreadyRegistered {
                command: command.to_string(),
            });
        }
        handlers.insert(command.to_string(), handler);
        Ok(())
    }

    pub fn contains(&self, command: &str) -> bool {
        self.handlers.borrow().contains_key(command)
    }

    /// Run the handler for `request` and build its response.
    pub fn dispatch(&self, request: &Request) -> Response {
        // Clone out so the handler may touch the table itself.
        let handler = self.handlers.borrow().get(&request.command).cloned();
        let Some(handler) = handler else {
            let error = WatchError::UnknownCommand {
                command: request.command.clone(),
            };
            crate::debug_event!("session", "unknown command", "{}", request.command);
            return Response::error(request.command.clone(), request.seq, error.to_string());
        };

        match handler(request) {
            Ok(handled) => Response::success(request, handled.response),
            Err(e) => {
                tracing::warn!("[session] {} failed: {e}", request.command);
                Response::error(request.command.clone(), request.seq, e.to_string())
            }
        }
    }
}

/// In-process session that records outbound notifications.
///
/// Requests are delivered by calling [`MemorySession::request`] directly.
pub struct MemorySession {
    canonicalizer: Canonicalizer,
    handlers: HandlerTable,
    sent: RefCell<Vec<WatcherNotification>>,
    next_seq: Cell<u64>,
}

impl MemorySession {
    pub fn new(canonicalizer: Canonicalizer) -> Self {
        Self {
            canonicalizer,
            handlers: HandlerTable::new(),
            sent: RefCell::new(Vec::new()),
            next_seq: Cell::new(1),
        }
    }

    /// Drain the notifications sent so far.
    pub fn take_events(&self) -> Vec<WatcherNotification> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    /// Notifications sent so far, without draining.
    pub fn events(&self) -> Vec<WatcherNotification> {
        self.sent.borrow().clone()
    }

    pub fn has_handler(&self, command: &str) -> bool {
        self.handlers.contains(command)
    }

    /// Deliver an inbound request and return the response.
    pub fn request(&self, command: &str, arguments: Value) -> Response {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        let request = Request {
            seq,
            message_type: "request".to_string(),
            command: command.to_string(),
            arguments,
        };
        self.handlers.dispatch(&request)
    }
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new(Canonicalizer::default())
    }
}

impl PathCanonicalizer for MemorySession {
    fn canonical_file_name(&self, path: &str) -> CanonicalPath {
        self.canonicalizer.canonicalize(path)
    }
}

impl EventSink for MemorySession {
    fn event(&self, notification: WatcherNotification) {
        self.sent.borrow_mut().push(notification);
    }
}

impl ProtocolHandlers for MemorySession {
    fn add_protocol_handler(&self, command: &str, handler: ProtocolHandler) -> Result<(), WatchError> {
        self.handlers.add(command, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalizer_case_folding() {
        let insensitive = Canonicalizer::new(false);
        assert_eq!(insensitive.canonicalize("/X/A.TS"), CanonicalPath::new("/x/a.ts"));

        let sensitive = Canonicalizer::new(true);
        assert_eq!(sensitive.canonicalize("/X/A.TS"), CanonicalPath::new("/X/A.TS"));
    }

    #[test]
    fn test_handler_table_rejects_duplicates() {
        let table = HandlerTable::new();
        let handler: ProtocolHandler = Rc::new(|_: &Request| Ok(HandlerResponse::new("ok")));

        assert!(table.add("ping", handler.clone()).is_ok());
        let err = table.add("ping", handler).unwrap_err();
        assert!(matches!(err, WatchError::HandlerAlreadyRegistered { .. }));
    }

    #[test]
    fn test_dispatch_unknown_command() {
        let session = MemorySession::new(Canonicalizer::new(true));
        let response = session.request("nope", Value::Null);

        assert!(!response.success);
        assert_eq!(response.request_seq, 1);
        assert_eq!(
            response.message.as_deref(),
            Some("Unrecognized JSON command: nope")
        );
    }

    #[test]
    fn test_dispatch_handler_result_and_error() {
        let session = MemorySession::new(Canonicalizer::new(true));
        session
            .add_protocol_handler(
                "echo",
                Rc::new(|request: &Request| {
                    if request.arguments.is_null() {
                        Err(WatchError::InvalidRequest {
                            reason: "missing arguments".to_string(),
                        })
                    } else {
                        Ok(HandlerResponse::new(request.arguments.clone()))
                    }
                }),
            )
            .unwrap();

        let ok = session.request("echo", json!({"a": 1}));
        assert!(ok.success);
        assert_eq!(ok.body, Some(json!({"a": 1})));

        let failed = session.request("echo", Value::Null);
        assert!(!failed.success);
        assert_eq!(failed.request_seq, 2);
        assert_eq!(failed.message.as_deref(), Some("Invalid request: missing arguments"));
    }

    #[test]
    fn test_same_session_identity() {
        let a: Rc<dyn Session> = Rc::new(MemorySession::default());
        let b: Rc<dyn Session> = Rc::new(MemorySession::default());
        assert!(same_session(&a, &a.clone()));
        assert!(!same_session(&a, &b));
    }
}
