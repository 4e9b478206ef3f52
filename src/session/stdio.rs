//! Newline-delimited JSON session over an async reader/writer pair.
//!
//! Each line read is one request envelope; each line written is one event
//! or response envelope. Notifications raised while a request is handled are
//! written before that request's response.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::{Event, Request, Response, WatcherNotification};
use crate::types::CanonicalPath;
use crate::watcher::WatchError;

use super::{Canonicalizer, EventSink, HandlerTable, PathCanonicalizer, ProtocolHandler, ProtocolHandlers};

/// Session whose outbound notifications are queued for [`serve`] to write.
pub struct StdioSession {
    canonicalizer: Canonicalizer,
    handlers: HandlerTable,
    outbound: mpsc::Sender<WatcherNotification>,
    capacity: usize,
}

impl StdioSession {
    /// Create a session and the receiving end of its notification queue.
    pub fn new(
        canonicalizer: Canonicalizer,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<WatcherNotification>) {
        let capacity = capacity.max(1);
        let (outbound, events) = mpsc::channel(capacity);
        let session = Self {
            canonicalizer,
            handlers: HandlerTable::new(),
            outbound,
            capacity,
        };
        (session, events)
    }

    /// Handle one input line. Blank lines produce no response.
    pub fn handle_line(&self, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("[stdio] unparseable message: {e}");
                return Some(Response::parse_error(format!("Failed to parse request: {e}")));
            }
        };

        if request.message_type != "request" {
            return Some(Response::error(
                request.command.clone(),
                request.seq,
                format!("Expected a request, got \"{}\"", request.message_type),
            ));
        }

        crate::debug_event!("stdio", "request", "{} seq={}", request.command, request.seq);
        Some(self.handlers.dispatch(&request))
    }
}

impl PathCanonicalizer for StdioSession {
    fn canonical_file_name(&self, path: &str) -> CanonicalPath {
        self.canonicalizer.canonicalize(path)
    }
}

impl EventSink for StdioSession {
    fn event(&self, notification: WatcherNotification) {
        match self.outbound.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    "[stdio] reached outbound capacity of {}, dropping {} for id {}",
                    self.capacity,
                    dropped.event_name(),
                    dropped.id()
                );
            }
            Err(TrySendError::Closed(dropped)) => {
                crate::debug_event!("stdio", "dropped", "{} after shutdown", dropped.event_name());
            }
        }
    }
}

impl ProtocolHandlers for StdioSession {
    fn add_protocol_handler(&self, command: &str, handler: ProtocolHandler) -> Result<(), WatchError> {
        self.handlers.add(command, handler)
    }
}

/// Pump requests from `reader` through `session` until end of input.
///
/// Queued notifications are written as they arrive. When the input closes,
/// `on_input_closed` runs while the queue is still open, so the
/// `closeWatcher` notifications it raises are written along with anything
/// else still queued before returning.
pub async fn serve<R, W, F>(
    session: &StdioSession,
    mut events: mpsc::Receiver<WatcherNotification>,
    reader: R,
    mut writer: W,
    on_input_closed: F,
) -> Result<(), WatchError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnOnce(),
{
    let mut lines = reader.lines();
    let mut seq: u64 = 0;

    crate::debug_event!("stdio", "serving");

    loop {
        tokio::select! {
            biased;

            Some(notification) = events.recv() => {
                seq += 1;
                write_message(&mut writer, &Event::new(seq, &notification)).await?;
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let Some(mut response) = session.handle_line(&line) else {
                    continue;
                };
                while let Ok(notification) = events.try_recv() {
                    seq += 1;
                    write_message(&mut writer, &Event::new(seq, &notification)).await?;
                }
                seq += 1;
                response.seq = seq;
                write_message(&mut writer, &response).await?;
            }
        }
    }

    on_input_closed();
    while let Ok(notification) = events.try_recv() {
        seq += 1;
        write_message(&mut writer, &Event::new(seq, &notification)).await?;
    }
    writer.flush().await?;

    crate::debug_event!("stdio", "input closed", "{seq} messages written");
    Ok(())
}

async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), WatchError>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{WatchId, WatchType};

    #[test]
    fn test_handle_line_rejects_garbage() {
        let (session, _events) = StdioSession::new(Canonicalizer::new(true), 4);

        assert!(session.handle_line("   ").is_none());

        let response = session.handle_line("not json").unwrap();
        assert!(!response.success);
        assert_eq!(response.request_seq, 0);

        let response = session
            .handle_line(r#"{"seq":3,"type":"event","command":"onWatchChange"}"#)
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.request_seq, 3);
    }

    #[test]
    fn test_full_queue_drops_notification() {
        let (session, mut events) = StdioSession::new(Canonicalizer::new(true), 1);
        let close = |id| WatcherNotification::CloseWatcher {
            id: WatchId::new(id).unwrap(),
            watch_type: WatchType::File,
        };

        session.event(close(1));
        session.event(close(2));

        assert_eq!(events.try_recv().unwrap(), close(1));
        assert!(events.try_recv().is_err());
    }
}
