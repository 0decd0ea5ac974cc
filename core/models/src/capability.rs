//! Capabilities grant permissions to entities and the members of groups.
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use netauth_errors::Error;

/// Closed set of permissions known to the tree.
///
/// [`Capability::GlobalRoot`] implies every other capability.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    prost::Enumeration,
    Serialize,
    Deserialize,
)]
#[repr(i32)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    GlobalRoot = 0,
    CreateEntity = 10,
    DestroyEntity = 11,
    ModifyEntityMeta = 12,
    ModifyEntityKeys = 13,
    ChangeEntitySecret = 14,
    LockEntity = 15,
    UnlockEntity = 16,
    CreateGroup = 20,
    DestroyGroup = 21,
    ModifyGroupMeta = 22,
    ModifyGroupMembers = 23,
}

impl Capability {
    /// All capabilities in declaration order.
    pub const ALL: [Capability; 12] = [
        Capability::GlobalRoot,
        Capability::CreateEntity,
        Capability::DestroyEntity,
        Capability::ModifyEntityMeta,
        Capability::ModifyEntityKeys,
        Capability::ChangeEntitySecret,
        Capability::LockEntity,
        Capability::UnlockEntity,
        Capability::CreateGroup,
        Capability::DestroyGroup,
        Capability::ModifyGroupMeta,
        Capability::ModifyGroupMembers,
    ];

    /// Canonical upper case name of the capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::GlobalRoot => "GLOBAL_ROOT",
            Capability::CreateEntity => "CREATE_ENTITY",
            Capability::DestroyEntity => "DESTROY_ENTITY",
            Capability::ModifyEntityMeta => "MODIFY_ENTITY_META",
            Capability::ModifyEntityKeys => "MODIFY_ENTITY_KEYS",
            Capability::ChangeEntitySecret => "CHANGE_ENTITY_SECRET",
            Capability::LockEntity => "LOCK_ENTITY",
            Capability::UnlockEntity => "UNLOCK_ENTITY",
            Capability::CreateGroup => "CREATE_GROUP",
            Capability::DestroyGroup => "DESTROY_GROUP",
            Capability::ModifyGroupMeta => "MODIFY_GROUP_META",
            Capability::ModifyGroupMembers => "MODIFY_GROUP_MEMBERS",
        }
    }

    /// Decode a capability from its wire value.
    pub fn from_wire(value: i32) -> Option<Capability> {
        Capability::ALL
            .into_iter()
            .find(|capability| *capability as i32 == value)
    }

    /// Check if holding `self` satisfies a check for `required`.
    pub fn satisfies(&self, required: Capability) -> bool {
        *self == Capability::GlobalRoot || *self == required
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|capability| capability.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| Error::UnknownCapability(value.to_string()))
    }
}

/// Check if any capability in a list of wire values satisfies the `required` capability.
pub fn satisfied_by(held: &[i32], required: Capability) -> bool {
    held.iter()
        .filter_map(|value| Capability::from_wire(*value))
        .any(|capability| capability.satisfies(required))
}

#[cfg(test)]
mod tests {
    use super::satisfied_by;
    use super::Capability;

    #[test]
    fn parse_names() {
        let capability: Capability = "MODIFY_GROUP_MEMBERS".parse().unwrap();
        assert_eq!(capability, Capability::ModifyGroupMembers);
        let capability: Capability = "global_root".parse().unwrap();
        assert_eq!(capability, Capability::GlobalRoot);
    }

    #[test]
    fn parse_unknown() {
        let error = "FLY".parse::<Capability>().unwrap_err();
        assert_eq!(error, netauth_errors::Error::UnknownCapability("FLY".into()));
    }

    #[test]
    fn global_root_satisfies_all() {
        for capability in Capability::ALL {
            assert!(Capability::GlobalRoot.satisfies(capability));
        }
        assert!(!Capability::LockEntity.satisfies(Capability::UnlockEntity));
    }

    #[test]
    fn wire_values() {
        assert_eq!(Capability::from_wire(23), Some(Capability::ModifyGroupMembers));
        assert_eq!(Capability::from_wire(99), None);
        assert!(satisfied_by(&[15, 0], Capability::DestroyGroup));
        assert!(!satisfied_by(&[15], Capability::DestroyGroup));
    }
}
