//! Change events for records in the NetAuth tree.
//!
//! Storage backends emit an [`Event`] every time an entity or group record changes.
//! Subscribers (the search index, caches, ...) register with the [`EventBus`]
//! to react to those changes.
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

pub mod emit;

pub use self::emit::Buffered;
pub use self::emit::EventBus;
pub use self::emit::EventCallback;

#[cfg(any(test, feature = "test-fixture"))]
pub use self::emit::EventsFixture;

/// Kind of change an [`Event`] describes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    EntityCreate,
    EntityUpdate,
    EntityDestroy,
    GroupCreate,
    GroupUpdate,
    GroupDestroy,
}

impl EventType {
    /// Check if the event is about an entity record.
    pub fn is_entity(&self) -> bool {
        matches!(
            self,
            EventType::EntityCreate | EventType::EntityUpdate | EventType::EntityDestroy
        )
    }

    /// Check if the event reports a record was removed.
    pub fn is_destroy(&self) -> bool {
        matches!(self, EventType::EntityDestroy | EventType::GroupDestroy)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::EntityCreate => "EntityCreate",
            EventType::EntityUpdate => "EntityUpdate",
            EventType::EntityDestroy => "EntityDestroy",
            EventType::GroupCreate => "GroupCreate",
            EventType::GroupUpdate => "GroupUpdate",
            EventType::GroupDestroy => "GroupDestroy",
        };
        f.write_str(name)
    }
}

/// A change to a record identified by its primary key (entity ID or group name).
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventType,
    pub pk: String,
}

impl Event {
    pub fn new<S: Into<String>>(kind: EventType, pk: S) -> Event {
        Event {
            kind,
            pk: pk.into(),
        }
    }

    /// Events without a primary key carry no information and are never emitted.
    pub fn is_empty(&self) -> bool {
        self.pk.is_empty()
    }
}
