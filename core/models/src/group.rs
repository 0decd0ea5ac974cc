//! Groups collect entities and grant capabilities to their members.
use serde::Deserialize;
use serde::Serialize;

use crate::kv::KvData;
use crate::Capability;

/// A named set of entities.
///
/// Field tags are part of the on-disk and plugin wire format and must never be reused.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    /// Unique and immutable name of the group.
    #[prost(string, tag = "1")]
    pub name: String,

    #[prost(string, optional, tag = "2")]
    pub display_name: Option<String>,

    /// Unique number of the group (`-1` in requests means "allocate one").
    #[prost(int32, tag = "3")]
    pub number: i32,

    /// Group whose members may manage the membership of this group.
    #[prost(string, optional, tag = "4")]
    pub managed_by: Option<String>,

    /// Capabilities granted to members, as [`Capability`] wire values.
    #[prost(enumeration = "Capability", repeated, tag = "5")]
    pub capabilities: Vec<i32>,

    /// Membership rules in the `INCLUDE:<group>` or `EXCLUDE:<group>` form.
    #[prost(string, repeated, tag = "6")]
    pub expansions: Vec<String>,

    /// Legacy `key{index}:value` metadata strings.
    #[prost(string, repeated, tag = "7")]
    pub untyped_meta: Vec<String>,

    /// Structured key/values metadata.
    #[prost(message, repeated, tag = "8")]
    pub kv: Vec<KvData>,
}

impl Group {
    /// Create a group request or record with only a name set.
    pub fn with_name<S: Into<String>>(name: S) -> Group {
        Group {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Check if the group grants a capability that satisfies `required`.
    pub fn has_capability(&self, required: Capability) -> bool {
        crate::capability::satisfied_by(&self.capabilities, required)
    }

    /// List the capabilities granted, ignoring unknown wire values.
    pub fn capability_set(&self) -> Vec<Capability> {
        self.capabilities
            .iter()
            .filter_map(|value| Capability::from_wire(*value))
            .collect()
    }
}
