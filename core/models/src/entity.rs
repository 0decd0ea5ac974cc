//! Entities are the principals (users and services) known to the tree.
use serde::Deserialize;
use serde::Serialize;

use crate::kv::KvData;
use crate::Capability;

/// Sentinel returned in place of stored secrets.
pub const REDACTED_SECRET: &str = "<REDACTED>";

/// A principal known to the tree.
///
/// Field tags are part of the on-disk and plugin wire format and must never be reused.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    /// Globally unique and immutable identifier of the entity.
    #[prost(string, tag = "1")]
    pub id: String,

    /// Unique number of the entity (`-1` in requests means "allocate one").
    #[prost(int32, tag = "2")]
    pub number: i32,

    /// Opaque blob produced by the crypto provider.
    #[prost(string, tag = "3")]
    pub secret: String,

    /// Structured metadata attached to the entity.
    #[prost(message, optional, tag = "4")]
    pub meta: Option<EntityMeta>,
}

/// Structured metadata attached to an [`Entity`].
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityMeta {
    #[prost(string, optional, tag = "1")]
    pub primary_group: Option<String>,

    #[prost(string, optional, tag = "2")]
    pub gecos: Option<String>,

    #[prost(string, optional, tag = "3")]
    pub legal_name: Option<String>,

    #[prost(string, optional, tag = "4")]
    pub display_name: Option<String>,

    #[prost(string, optional, tag = "5")]
    pub home: Option<String>,

    #[prost(string, optional, tag = "6")]
    pub shell: Option<String>,

    #[prost(string, optional, tag = "7")]
    pub graphical_shell: Option<String>,

    #[prost(string, optional, tag = "8")]
    pub badge_number: Option<String>,

    /// Locked entities can't authenticate.
    #[prost(bool, optional, tag = "9")]
    pub locked: Option<bool>,

    /// Capabilities held directly by the entity, as [`Capability`] wire values.
    #[prost(enumeration = "Capability", repeated, tag = "10")]
    pub capabilities: Vec<i32>,

    /// Direct group memberships.
    #[prost(string, repeated, tag = "11")]
    pub groups: Vec<String>,

    /// Public keys in the `TYPE:material` form.
    #[prost(string, repeated, tag = "12")]
    pub keys: Vec<String>,

    /// Legacy `key{index}:value` metadata strings.
    #[prost(string, repeated, tag = "13")]
    pub untyped_meta: Vec<String>,

    /// Structured key/values metadata.
    #[prost(message, repeated, tag = "14")]
    pub kv: Vec<KvData>,
}

impl Entity {
    /// Create an entity request or record with only an ID set.
    pub fn with_id<S: Into<String>>(id: S) -> Entity {
        Entity {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Check if the entity directly holds a capability that satisfies `required`.
    pub fn has_capability(&self, required: Capability) -> bool {
        match &self.meta {
            None => false,
            Some(meta) => crate::capability::satisfied_by(&meta.capabilities, required),
        }
    }

    /// Check if the entity is locked.
    pub fn is_locked(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|meta| meta.locked)
            .unwrap_or(false)
    }

    /// Access the entity metadata, allocating it if missing.
    pub fn meta_mut(&mut self) -> &mut EntityMeta {
        self.meta.get_or_insert_with(EntityMeta::default)
    }

    /// Return a copy of the entity safe to hand out of the server.
    ///
    /// The stored secret is replaced with [`REDACTED_SECRET`].
    pub fn redacted(&self) -> Entity {
        let mut safe = self.clone();
        safe.secret = REDACTED_SECRET.to_string();
        safe
    }
}

impl EntityMeta {
    /// List the capabilities held, ignoring unknown wire values.
    pub fn capability_set(&self) -> Vec<Capability> {
        self.capabilities
            .iter()
            .filter_map(|value| Capability::from_wire(*value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Entity;
    use super::EntityMeta;
    use super::REDACTED_SECRET;
    use crate::Capability;

    #[test]
    fn redacted_hides_secret() {
        let mut entity = Entity::with_id("alice");
        entity.secret = "$argon2id$...".into();
        let safe = entity.redacted();
        assert_eq!(safe.secret, REDACTED_SECRET);
        assert_eq!(safe.id, "alice");
        assert_eq!(entity.secret, "$argon2id$...");
    }

    #[test]
    fn capability_checks() {
        let mut entity = Entity::with_id("alice");
        assert!(!entity.has_capability(Capability::CreateEntity));
        entity.meta_mut().capabilities.push(Capability::CreateEntity as i32);
        assert!(entity.has_capability(Capability::CreateEntity));
        assert!(!entity.has_capability(Capability::DestroyEntity));
    }

    #[test]
    fn locked_defaults_false() {
        let mut entity = Entity::with_id("alice");
        assert!(!entity.is_locked());
        entity.meta = Some(EntityMeta {
            locked: Some(true),
            ..Default::default()
        });
        assert!(entity.is_locked());
    }
}
