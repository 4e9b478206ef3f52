//! Wire types exchanged with the external change source.
//!
//! Messages use the tsserver envelope: every message has a `seq` and a
//! `type` of `request`, `response` or `event`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{WatchEventType, WatchId, WatchType};

/// Command name of the one inbound request.
pub const WATCH_CHANGE_COMMAND: &str = "onWatchChange";

/// Body of every successful `onWatchChange` response.
pub const WATCH_CHANGE_ACK: &str = "onWatchChangeComplete";

pub const CREATE_FILE_WATCHER: &str = "createFileWatcher";
pub const CREATE_DIRECTORY_WATCHER: &str = "createDirectoryWatcher";
pub const CLOSE_WATCHER: &str = "closeWatcher";

/// Outbound, fire-and-forget notification to the change source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherNotification {
    CreateFileWatcher {
        path: String,
        id: WatchId,
    },
    CreateDirectoryWatcher {
        path: String,
        id: WatchId,
        recursive: bool,
    },
    CloseWatcher {
        id: WatchId,
        watch_type: WatchType,
    },
}

#[derive(Serialize)]
struct CreateBody<'a> {
    path: &'a str,
    id: WatchId,
    #[serde(skip_serializing_if = "Option::is_none")]
    recursive: Option<bool>,
}

#[derive(Serialize)]
struct CloseBody {
    id: WatchId,
    #[serde(rename = "type")]
    watch_type: WatchType,
}

impl WatcherNotification {
    /// Event name used in the envelope.
    pub fn event_name(&self) -> &'static str {
        match self {
            WatcherNotification::CreateFileWatcher { .. } => CREATE_FILE_WATCHER,
            WatcherNotification::CreateDirectoryWatcher { .. } => CREATE_DIRECTORY_WATCHER,
            WatcherNotification::CloseWatcher { .. } => CLOSE_WATCHER,
        }
    }

    pub fn id(&self) -> WatchId {
        match self {
            WatcherNotification::CreateFileWatcher { id, .. }
            | WatcherNotification::CreateDirectoryWatcher { id, .. }
            | WatcherNotification::CloseWatcher { id, .. } => *id,
        }
    }

    /// Event body as JSON.
    pub fn body(&self) -> Value {
        let body = match self {
            WatcherNotification::CreateFileWatcher { path, id } => {
                serde_json::to_value(CreateBody {
                    path,
                    id: *id,
                    recursive: None,
                })
            }
            WatcherNotification::CreateDirectoryWatcher {
                path,
                id,
                recursive,
            } => serde_json::to_value(CreateBody {
                path,
                id: *id,
                recursive: Some(*recursive),
            }),
            WatcherNotification::CloseWatcher { id, watch_type } => {
                serde_json::to_value(CloseBody {
                    id: *id,
                    watch_type: *watch_type,
                })
            }
        };
        body.unwrap_or(Value::Null)
    }
}

/// An inbound request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub seq: u64,

    #[serde(rename = "type")]
    pub message_type: String,

    pub command: String,

    #[serde(default)]
    pub arguments: Value,
}

/// A response to an inbound request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub seq: u64,

    #[serde(rename = "type")]
    pub message_type: &'static str,

    pub command: String,

    pub request_seq: u64,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    /// Creates a success response.
    pub fn success(request: &Request, body: Value) -> Self {
        Self {
            seq: 0,
            message_type: "response",
            command: request.command.clone(),
            request_seq: request.seq,
            success: true,
            body: Some(body),
            message: None,
        }
    }

    /// Creates a failed response.
    pub fn error(command: impl Into<String>, request_seq: u64, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            message_type: "response",
            command: command.into(),
            request_seq,
            success: false,
            body: None,
            message: Some(message.into()),
        }
    }

    /// Response for a line that could not be parsed as a request.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error("unknown", 0, message)
    }
}

/// An outbound event envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub seq: u64,

    #[serde(rename = "type")]
    pub message_type: &'static str,

    pub event: &'static str,

    pub body: Value,
}

impl Event {
    pub fn new(seq: u64, notification: &WatcherNotification) -> Self {
        Self {
            seq,
            message_type: "event",
            event: notification.event_name(),
            body: notification.body(),
        }
    }
}

/// What a protocol handler hands back to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub response: Value,
}

impl HandlerResponse {
    pub fn new(response: impl Into<Value>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

/// Arguments of an `onWatchChange` request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchChangeArgs {
    /// Raw wire id; ids that were never issued are ignored by the router.
    pub id: u64,
    pub path: String,
    pub event_type: WatchEventType,
}
