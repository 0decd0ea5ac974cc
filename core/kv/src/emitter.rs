//! Helper for backends to report changes on an [`EventBus`].
use std::sync::RwLock;

use netauth_context::Context;
use netauth_events::EventBus;

use crate::keys;

/// Holds the [`EventBus`] installed on a backend and fires events for changed keys.
#[derive(Default)]
pub struct EventEmitter {
    events: RwLock<Option<EventBus>>,
}

impl EventEmitter {
    /// Report a change to the record at `key`.
    ///
    /// Nothing is emitted if no [`EventBus`] is installed or if the key is not a record key.
    pub async fn emit(&self, context: &Context, key: &str, deleted: bool) {
        let event = match keys::event_for(key, deleted) {
            None => return,
            Some(event) => event,
        };
        let events = self
            .events
            .read()
            .expect("EventEmitter bus lock poisoned")
            .clone();
        match events {
            None => slog::trace!(context.logger, "No event bus to emit events on"; "key" => key),
            Some(events) => events.fire(context, event).await,
        }
    }

    /// Install the [`EventBus`] to report changes to.
    pub fn install(&self, events: EventBus) {
        let mut slot = self
            .events
            .write()
            .expect("EventEmitter bus lock poisoned");
        *slot = Some(events);
    }
}
