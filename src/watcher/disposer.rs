//! Handle returned for each subscription.

use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

use crate::protocol::WatcherNotification;
use crate::types::{CanonicalPath, WatchId, WatchType};

use super::collection::Unsubscribed;
use super::factory::FactoryState;
use super::registry::Subscriber;

/// Removes one subscription when closed.
///
/// Closing is idempotent. Dropping a disposer does not close it; the
/// subscription stays live until `close` is called.
pub struct Disposer {
    state: Weak<RefCell<FactoryState>>,
    key: CanonicalPath,
    id: WatchId,
    subscriber: Subscriber,
}

impl Disposer {
    pub(crate) fn new(
        state: Weak<RefCell<FactoryState>>,
        key: CanonicalPath,
        id: WatchId,
        subscriber: Subscriber,
    ) -> Self {
        Self {
            state,
            key,
            id,
            subscriber,
        }
    }

    pub fn id(&self) -> WatchId {
        self.id
    }

    pub fn watch_type(&self) -> WatchType {
        self.subscriber.watch_type()
    }

    /// Canonical form of the watched path.
    pub fn path(&self) -> &CanonicalPath {
        &self.key
    }

    /// Remove this subscription. The last close for a path tells the session
    /// to close the watcher.
    pub fn close(&self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };

        let (outcome, session) = {
            let mut state = state.borrow_mut();
            let outcome = state
                .registry
                .unsubscribe(&self.key, self.id, &self.subscriber);
            (outcome, state.session.clone())
        };

        match outcome {
            Unsubscribed::Missing => {}
            Unsubscribed::Remaining(count) => {
                crate::debug_event!("disposer", "released", "id={} {count} remaining", self.id);
            }
            Unsubscribed::Released => {
                crate::debug_event!(
                    "disposer",
                    "close",
                    "{} {} id={}",
                    self.watch_type(),
                    self.key,
                    self.id
                );
                if let Some(session) = session {
                    session.event(WatcherNotification::CloseWatcher {
                        id: self.id,
                        watch_type: self.watch_type(),
                    });
                }
            }
        }
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("id", &self.id)
            .field("type", &self.watch_type())
            .field("path", &self.key)
            .finish()
    }
}
