//! Actions tree plugins can react to.
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use netauth_errors::Error;

/// Points in the tree's chains where plugins are invoked.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Action {
    EntityCreate,
    EntityUpdate,
    EntityLock,
    EntityUnlock,
    EntityDestroy,
    GroupCreate,
    GroupUpdate,
    GroupDestroy,
    PreSecretChange,
    PostSecretChange,
    PreAuthCheck,
    PostAuthCheck,
    PreTokenAuth,
    PostTokenAuth,
}

impl Action {
    /// All actions in declaration order.
    pub const ALL: [Action; 14] = [
        Action::EntityCreate,
        Action::EntityUpdate,
        Action::EntityLock,
        Action::EntityUnlock,
        Action::EntityDestroy,
        Action::GroupCreate,
        Action::GroupUpdate,
        Action::GroupDestroy,
        Action::PreSecretChange,
        Action::PostSecretChange,
        Action::PreAuthCheck,
        Action::PostAuthCheck,
        Action::PreTokenAuth,
        Action::PostTokenAuth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::EntityCreate => "EntityCreate",
            Action::EntityUpdate => "EntityUpdate",
            Action::EntityLock => "EntityLock",
            Action::EntityUnlock => "EntityUnlock",
            Action::EntityDestroy => "EntityDestroy",
            Action::GroupCreate => "GroupCreate",
            Action::GroupUpdate => "GroupUpdate",
            Action::GroupDestroy => "GroupDestroy",
            Action::PreSecretChange => "PreSecretChange",
            Action::PostSecretChange => "PostSecretChange",
            Action::PreAuthCheck => "PreAuthCheck",
            Action::PostAuthCheck => "PostAuthCheck",
            Action::PreTokenAuth => "PreTokenAuth",
            Action::PostTokenAuth => "PostTokenAuth",
        }
    }

    /// Name of the hook invoking plugins for this action (`plugin-<action>`).
    pub fn hook_name(&self) -> String {
        format!("plugin-{}", self.as_str().to_lowercase())
    }

    /// Check if the action processes groups rather than entities.
    pub fn is_group(&self) -> bool {
        matches!(
            self,
            Action::GroupCreate | Action::GroupUpdate | Action::GroupDestroy
        )
    }

    /// Priority of the hook invoking plugins for this action.
    ///
    /// Pre-action hooks run in the 20-29 band, before validation and mutation.
    /// Post-action hooks run in the 60-89 band, after mutation and before storage.
    pub fn priority(&self) -> u8 {
        match self {
            Action::PreSecretChange | Action::PreAuthCheck | Action::PreTokenAuth => 25,
            Action::EntityCreate
            | Action::EntityUpdate
            | Action::EntityLock
            | Action::EntityUnlock
            | Action::EntityDestroy
            | Action::GroupCreate
            | Action::GroupUpdate
            | Action::GroupDestroy => 60,
            Action::PostSecretChange | Action::PostAuthCheck | Action::PostTokenAuth => 70,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(value))
            .copied()
            .ok_or_else(|| Error::MalformedRequest(format!("unknown plugin action '{}'", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::Action;

    #[test]
    fn hook_names() {
        assert_eq!(Action::EntityCreate.hook_name(), "plugin-entitycreate");
        assert_eq!(Action::PreSecretChange.hook_name(), "plugin-presecretchange");
    }

    #[test]
    fn priority_bands() {
        for action in Action::ALL {
            let priority = action.priority();
            let pre = action.as_str().starts_with("Pre");
            match pre {
                true => assert!((20..=29).contains(&priority), "{}", action),
                false => assert!((60..=89).contains(&priority), "{}", action),
            }
        }
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!("preauthcheck".parse::<Action>().unwrap(), Action::PreAuthCheck);
        assert!("nothing".parse::<Action>().is_err());
    }
}
