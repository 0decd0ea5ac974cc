//! Hooks are the named, prioritised steps chains are assembled from.
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use netauth_context::Context;
use netauth_crypto::Crypto;
use netauth_db::Db;
use netauth_errors::Error;
use netauth_models::Entity;
use netauth_models::Group;
use netauth_plugin::PluginManager;

/// A step of an entity chain.
///
/// Hooks transform the `working` entity, starting from an empty entity, based on the
/// `request` the chain was invoked with.
#[async_trait::async_trait]
pub trait EntityHook: Send + Sync {
    /// Unique name of the hook among entity hooks.
    fn name(&self) -> &str;

    /// Position of the hook in the chains it is part of, lower runs first.
    fn priority(&self) -> u8;

    async fn run(&self, context: &Context, working: &mut Entity, request: &Entity) -> Result<()>;
}

/// A step of a group chain.
#[async_trait::async_trait]
pub trait GroupHook: Send + Sync {
    /// Unique name of the hook among group hooks.
    fn name(&self) -> &str;

    /// Position of the hook in the chains it is part of, lower runs first.
    fn priority(&self) -> u8;

    async fn run(&self, context: &Context, working: &mut Group, request: &Group) -> Result<()>;
}

/// Resources available to hook constructors.
#[derive(Clone)]
pub struct RefContext {
    pub crypto: Crypto,
    pub db: Db,
    pub plugins: PluginManager,
}

/// Build an [`EntityHook`] from the shared resources.
pub type EntityHookConstructor =
    Box<dyn Fn(&RefContext) -> Result<Arc<dyn EntityHook>> + Send + Sync>;

/// Build a [`GroupHook`] from the shared resources.
pub type GroupHookConstructor = Box<dyn Fn(&RefContext) -> Result<Arc<dyn GroupHook>> + Send + Sync>;

/// Entity hook that only transforms values, without access to other resources.
pub struct PureEntityHook {
    name: &'static str,
    priority: u8,
    transform: fn(&mut Entity, &Entity) -> Result<()>,
}

impl PureEntityHook {
    pub fn new(
        name: &'static str,
        priority: u8,
        transform: fn(&mut Entity, &Entity) -> Result<()>,
    ) -> PureEntityHook {
        PureEntityHook {
            name,
            priority,
            transform,
        }
    }
}

#[async_trait::async_trait]
impl EntityHook for PureEntityHook {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn run(&self, _: &Context, working: &mut Entity, request: &Entity) -> Result<()> {
        (self.transform)(working, request)
    }
}

/// Group hook that only transforms values, without access to other resources.
pub struct PureGroupHook {
    name: &'static str,
    priority: u8,
    transform: fn(&mut Group, &Group) -> Result<()>,
}

impl PureGroupHook {
    pub fn new(
        name: &'static str,
        priority: u8,
        transform: fn(&mut Group, &Group) -> Result<()>,
    ) -> PureGroupHook {
        PureGroupHook {
            name,
            priority,
            transform,
        }
    }
}

#[async_trait::async_trait]
impl GroupHook for PureGroupHook {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn run(&self, _: &Context, working: &mut Group, request: &Group) -> Result<()> {
        (self.transform)(working, request)
    }
}

/// Collect hook constructors during process initialisation.
///
/// Once all hooks are registered the builder is turned into a read-only [`HookRegistry`].
#[derive(Default)]
pub struct HookRegistryBuilder {
    entity: BTreeMap<String, EntityHookConstructor>,
    group: BTreeMap<String, GroupHookConstructor>,
}

impl HookRegistryBuilder {
    /// Register the constructor of an entity hook.
    ///
    /// Fails with [`Error::HookExists`] if an entity hook with the same name is registered.
    pub fn entity<F>(&mut self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn(&RefContext) -> Result<Arc<dyn EntityHook>> + Send + Sync + 'static,
    {
        if self.entity.contains_key(name) {
            anyhow::bail!(Error::HookExists(name.to_string()));
        }
        self.entity.insert(name.to_string(), Box::new(constructor));
        Ok(())
    }

    /// Register the constructor of a group hook.
    ///
    /// Fails with [`Error::HookExists`] if a group hook with the same name is registered.
    pub fn group<F>(&mut self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn(&RefContext) -> Result<Arc<dyn GroupHook>> + Send + Sync + 'static,
    {
        if self.group.contains_key(name) {
            anyhow::bail!(Error::HookExists(name.to_string()));
        }
        self.group.insert(name.to_string(), Box::new(constructor));
        Ok(())
    }

    /// Construct all registered hooks.
    ///
    /// Constructors that fail are logged and skipped: chains referencing them fail to assemble.
    pub fn finish(self, context: &Context, refs: &RefContext) -> HookRegistry {
        let mut registry = HookRegistry::default();
        for (name, constructor) in self.entity {
            match constructor(refs) {
                Ok(hook) => {
                    registry.entity.insert(name, hook);
                }
                Err(error) => slog::warn!(
                    context.logger, "Unable to construct entity hook, skipping";
                    "hook" => name,
                    "error" => format!("{:#}", error),
                ),
            }
        }
        for (name, constructor) in self.group {
            match constructor(refs) {
                Ok(hook) => {
                    registry.group.insert(name, hook);
                }
                Err(error) => slog::warn!(
                    context.logger, "Unable to construct group hook, skipping";
                    "hook" => name,
                    "error" => format!("{:#}", error),
                ),
            }
        }
        registry
    }
}

/// Constructed hooks, by name.
#[derive(Default)]
pub struct HookRegistry {
    entity: BTreeMap<String, Arc<dyn EntityHook>>,
    group: BTreeMap<String, Arc<dyn GroupHook>>,
}

impl HookRegistry {
    /// Look up an entity hook, failing with [`Error::UnknownHook`].
    pub fn entity(&self, name: &str) -> Result<Arc<dyn EntityHook>> {
        match self.entity.get(name) {
            Some(hook) => Ok(Arc::clone(hook)),
            None => anyhow::bail!(Error::UnknownHook(name.to_string())),
        }
    }

    /// Look up a group hook, failing with [`Error::UnknownHook`].
    pub fn group(&self, name: &str) -> Result<Arc<dyn GroupHook>> {
        match self.group.get(name) {
            Some(hook) => Ok(Arc::clone(hook)),
            None => anyhow::bail!(Error::UnknownHook(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use netauth_context::Context;
    use netauth_errors::Error;

    use super::EntityHook;
    use super::HookRegistryBuilder;
    use super::PureEntityHook;
    use crate::tests::refs;

    fn noop(_: &mut netauth_models::Entity, _: &netauth_models::Entity) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut builder = HookRegistryBuilder::default();
        builder
            .entity("noop", |_| Ok(Arc::new(PureEntityHook::new("noop", 50, noop))))
            .unwrap();
        let error = builder
            .entity("noop", |_| Ok(Arc::new(PureEntityHook::new("noop", 50, noop))))
            .unwrap_err();
        assert_eq!(Error::find(&error), Some(&Error::HookExists("noop".into())));

        // Entity and group hooks live in separate namespaces.
        builder
            .group("noop", |_| anyhow::bail!("not needed"))
            .unwrap();
    }

    #[tokio::test]
    async fn failed_constructors_are_skipped() {
        let context = Context::fixture();
        let mut builder = HookRegistryBuilder::default();
        builder
            .entity("noop", |_| Ok(Arc::new(PureEntityHook::new("noop", 50, noop))))
            .unwrap();
        builder
            .entity("broken", |_| anyhow::bail!("constructor failed"))
            .unwrap();
        let registry = builder.finish(&context, &refs(&context).await);

        let hook = registry.entity("noop").unwrap();
        assert_eq!(hook.name(), "noop");
        assert_eq!(hook.priority(), 50);
        let error = registry.entity("broken").err().unwrap();
        assert_eq!(Error::find(&error), Some(&Error::UnknownHook("broken".into())));
    }
}
