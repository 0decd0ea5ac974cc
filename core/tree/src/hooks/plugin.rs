//! Hooks invoking tree plugins.
use anyhow::Result;

use netauth_context::Context;
use netauth_models::codec;
use netauth_models::Entity;
use netauth_models::Group;
use netauth_plugin::Action;
use netauth_plugin::PluginManager;

use crate::hook::EntityHook;
use crate::hook::GroupHook;

/// Pass the working entity through all loaded plugins for an action.
///
/// The result of the plugins replaces the working entity.
/// Without loaded plugins the hook does nothing.
pub struct EntityPluginHook {
    action: Action,
    name: String,
    plugins: PluginManager,
}

impl EntityPluginHook {
    pub fn new(action: Action, plugins: PluginManager) -> EntityPluginHook {
        EntityPluginHook {
            action,
            name: action.hook_name(),
            plugins,
        }
    }
}

#[async_trait::async_trait]
impl EntityHook for EntityPluginHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.action.priority()
    }

    async fn run(&self, context: &Context, working: &mut Entity, request: &Entity) -> Result<()> {
        if self.plugins.is_empty() {
            return Ok(());
        }
        let context = context
            .derive()
            .log_values(slog::o!("action" => self.action.as_str()))
            .build();
        let result = self
            .plugins
            .invoke_entity(&context, self.action, working.clone(), request)
            .await?;
        *working = Entity::default();
        codec::merge_entity(working, &result)
    }
}

/// Pass the working group through all loaded plugins for an action.
pub struct GroupPluginHook {
    action: Action,
    name: String,
    plugins: PluginManager,
}

impl GroupPluginHook {
    pub fn new(action: Action, plugins: PluginManager) -> GroupPluginHook {
        GroupPluginHook {
            action,
            name: action.hook_name(),
            plugins,
        }
    }
}

#[async_trait::async_trait]
impl GroupHook for GroupPluginHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.action.priority()
    }

    async fn run(&self, context: &Context, working: &mut Group, request: &Group) -> Result<()> {
        if self.plugins.is_empty() {
            return Ok(());
        }
        let context = context
            .derive()
            .log_values(slog::o!("action" => self.action.as_str()))
            .build();
        let result = self
            .plugins
            .invoke_group(&context, self.action, working.clone(), request)
            .await?;
        // Repeated fields would be duplicated by merging into the current value.
        *working = Group::default();
        codec::merge_group(working, &result)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use netauth_context::Context;
    use netauth_models::Entity;
    use netauth_plugin::Action;
    use netauth_plugin::Plugin;
    use netauth_plugin::PluginManager;

    use super::EntityPluginHook;
    use crate::hook::EntityHook;

    struct Renamer;

    #[async_trait::async_trait]
    impl Plugin for Renamer {
        async fn entity_update(&self, _: &Context, mut entity: Entity, _: Entity) -> Result<Entity> {
            entity.meta_mut().display_name = Some("Renamed".into());
            entity.meta_mut().groups.clear();
            Ok(entity)
        }
    }

    #[tokio::test]
    async fn noop_without_plugins() {
        let context = Context::fixture();
        let hook = EntityPluginHook::new(Action::EntityUpdate, PluginManager::default());
        assert_eq!(hook.name(), "plugin-entityupdate");
        assert_eq!(hook.priority(), 60);
        let mut working = Entity::with_id("alice");
        hook.run(&context, &mut working, &Entity::default())
            .await
            .unwrap();
        assert_eq!(working, Entity::with_id("alice"));
    }

    #[tokio::test]
    async fn plugins_overwrite_working() {
        let context = Context::fixture();
        let plugins = PluginManager::fixture(vec![("renamer", Renamer)]);
        let hook = EntityPluginHook::new(Action::EntityUpdate, plugins);
        let mut working = Entity::with_id("alice");
        working.meta_mut().groups.push("dev".into());
        hook.run(&context, &mut working, &Entity::default())
            .await
            .unwrap();
        let meta = working.meta.unwrap();
        assert_eq!(meta.display_name.as_deref(), Some("Renamed"));
        assert!(meta.groups.is_empty());
    }
}
