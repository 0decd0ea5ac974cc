//! Layout of the KV key space.
//!
//! Records are stored under path-shaped keys:
//!
//! - Entities live at `/entities/<ID>`.
//! - Groups live at `/groups/<Name>`.
use netauth_events::Event;
use netauth_events::EventType;

/// Glob matching every entity key.
pub const ENTITIES_GLOB: &str = "/entities/*";

/// Prefix of all entity keys.
pub const ENTITIES_PREFIX: &str = "/entities/";

/// Glob matching every group key.
pub const GROUPS_GLOB: &str = "/groups/*";

/// Prefix of all group keys.
pub const GROUPS_PREFIX: &str = "/groups/";

/// Key an entity record is stored at.
pub fn entity(id: &str) -> String {
    format!("{}{}", ENTITIES_PREFIX, id)
}

/// Key a group record is stored at.
pub fn group(name: &str) -> String {
    format!("{}{}", GROUPS_PREFIX, name)
}

/// Event describing a change to the record at `key`.
///
/// Keys outside the entity and group spaces, or with an empty primary key, have no event.
pub fn event_for(key: &str, deleted: bool) -> Option<Event> {
    let event = if let Some(id) = key.strip_prefix(ENTITIES_PREFIX) {
        let kind = match deleted {
            true => EventType::EntityDestroy,
            false => EventType::EntityUpdate,
        };
        Event::new(kind, id)
    } else if let Some(name) = key.strip_prefix(GROUPS_PREFIX) {
        let kind = match deleted {
            true => EventType::GroupDestroy,
            false => EventType::GroupUpdate,
        };
        Event::new(kind, name)
    } else {
        return None;
    };
    match event.is_empty() {
        true => None,
        false => Some(event),
    }
}

/// Extract the primary key from a KV key, if the key is in the entity or group space.
pub fn primary_key(key: &str) -> Option<&str> {
    key.strip_prefix(ENTITIES_PREFIX)
        .or_else(|| key.strip_prefix(GROUPS_PREFIX))
}
