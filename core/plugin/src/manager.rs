//! Discover, load and invoke tree plugins.
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use slog::info;
use slog::warn;

use netauth_context::Context;
use netauth_models::Entity;
use netauth_models::Group;

use crate::handle::PluginHandle;
use crate::handle::ProcessHandle;
use crate::handle::CALL_TIMEOUT;
use crate::protocol::EntityOpts;
use crate::protocol::GroupOpts;
use crate::Action;

/// File extension of discoverable plugin binaries.
pub const PLUGIN_EXTENSION: &str = "treeplugin";

/// Where plugins are loaded from.
#[derive(Clone, Debug, Default)]
pub struct DiscoveryOpts {
    /// Load only the plugins in `list` instead of scanning `path`.
    pub loadstatic: bool,

    /// Plugins to load when `loadstatic` is set.
    pub list: Vec<PathBuf>,

    /// Directory scanned for `*.treeplugin` files.
    pub path: PathBuf,

    /// Time allowed for plugins to answer each call, [`CALL_TIMEOUT`] if not set.
    pub call_timeout: Option<Duration>,
}

/// Set of loaded plugins, invoked in a stable order.
///
/// The set is assembled at startup and is read-only afterwards.
#[derive(Clone, Default)]
pub struct PluginManager {
    handles: Arc<Vec<Arc<dyn PluginHandle>>>,
}

impl PluginManager {
    /// Load plugins as configured.
    ///
    /// Plugins that fail to start or complete the handshake are logged and skipped.
    pub async fn discover(context: &Context, opts: &DiscoveryOpts) -> PluginManager {
        let paths = match opts.loadstatic {
            true => opts.list.clone(),
            false => scan(context, &opts.path),
        };

        let call_timeout = opts.call_timeout.unwrap_or(CALL_TIMEOUT);
        let mut handles: Vec<Arc<dyn PluginHandle>> = Vec::new();
        for path in paths {
            match ProcessHandle::spawn(context, &path).await {
                Ok(handle) => {
                    let handle = handle.with_call_timeout(call_timeout);
                    info!(context.logger, "Loaded tree plugin"; "plugin" => handle.name());
                    handles.push(Arc::new(handle));
                }
                Err(error) => warn!(
                    context.logger, "Unable to load tree plugin, skipping";
                    "plugin" => %path.display(),
                    "error" => format!("{:#}", error),
                ),
            }
        }
        PluginManager::from_handles(handles)
    }

    /// Assemble a manager from already loaded plugins.
    pub fn from_handles(mut handles: Vec<Arc<dyn PluginHandle>>) -> PluginManager {
        handles.sort_by(|left, right| left.name().cmp(right.name()));
        PluginManager {
            handles: Arc::new(handles),
        }
    }

    /// Pass an entity through every loaded plugin for the given action.
    ///
    /// Each plugin receives the entity returned by the previous one.
    /// The first plugin error aborts the invocation.
    pub async fn invoke_entity(
        &self,
        context: &Context,
        action: Action,
        entity: Entity,
        data: &Entity,
    ) -> Result<Entity> {
        let mut entity = entity;
        for handle in self.handles.iter() {
            let opts = EntityOpts {
                action,
                entity,
                data_entity: data.clone(),
            };
            entity = handle.process_entity(context, opts).await?;
        }
        Ok(entity)
    }

    /// Pass a group through every loaded plugin for the given action.
    pub async fn invoke_group(
        &self,
        context: &Context,
        action: Action,
        group: Group,
        data: &Group,
    ) -> Result<Group> {
        let mut group = group;
        for handle in self.handles.iter() {
            let opts = GroupOpts {
                action,
                group,
                data_group: data.clone(),
            };
            group = handle.process_group(context, opts).await?;
        }
        Ok(group)
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Best-effort stop of every loaded plugin.
    pub async fn kill_all(&self, context: &Context) {
        for handle in self.handles.iter() {
            handle.kill(context).await;
        }
    }

    /// Names of the loaded plugins, in invocation order.
    pub fn names(&self) -> Vec<String> {
        self.handles
            .iter()
            .map(|handle| handle.name().to_string())
            .collect()
    }
}

fn scan(context: &Context, path: &Path) -> Vec<PathBuf> {
    let pattern = path.join(format!("*.{}", PLUGIN_EXTENSION));
    let pattern = pattern.to_string_lossy();
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(error) => {
            warn!(
                context.logger, "Invalid plugin directory, no plugins loaded";
                "path" => %path.display(),
                "error" => %error,
            );
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => found.push(path),
            Err(error) => warn!(
                context.logger, "Unable to inspect plugin path";
                "error" => %error,
            ),
        }
    }
    found
}

#[cfg(any(test, feature = "test-fixture"))]
impl PluginManager {
    /// Manager invoking the given plugins in the current process.
    pub fn fixture<P>(plugins: Vec<(&str, P)>) -> PluginManager
    where
        P: crate::Plugin + 'static,
    {
        let handles = plugins
            .into_iter()
            .map(|(name, plugin)| {
                Arc::new(crate::LocalPlugin::new(name, plugin)) as Arc<dyn PluginHandle>
            })
            .collect();
        PluginManager::from_handles(handles)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use netauth_context::Context;
    use netauth_errors::Error;
    use netauth_models::Entity;
    use netauth_models::Group;

    use super::DiscoveryOpts;
    use super::PluginManager;
    use crate::Action;
    use crate::Plugin;

    /// Append a marker to the entity shell on every update.
    struct Marker(&'static str);

    #[async_trait::async_trait]
    impl Plugin for Marker {
        async fn entity_update(&self, _: &Context, mut entity: Entity, _: Entity) -> Result<Entity> {
            let meta = entity.meta_mut();
            let shell = meta.shell.get_or_insert_with(String::new);
            shell.push_str(self.0);
            Ok(entity)
        }

        async fn group_create(&self, _: &Context, mut group: Group, data: Group) -> Result<Group> {
            group.display_name = Some(format!("{} ({})", data.name, self.0));
            Ok(group)
        }
    }

    struct Refuse;

    #[async_trait::async_trait]
    impl Plugin for Refuse {
        async fn entity_update(&self, _: &Context, _: Entity, _: Entity) -> Result<Entity> {
            anyhow::bail!(Error::MalformedRequest("refused".into()))
        }
    }

    #[tokio::test]
    async fn value_evolves_through_plugins() {
        let context = Context::fixture();
        let manager = PluginManager::fixture(vec![("b", Marker("b")), ("a", Marker("a"))]);
        assert_eq!(manager.names(), vec!["a", "b"]);

        let data = Entity::with_id("alice");
        let entity = manager
            .invoke_entity(&context, Action::EntityUpdate, data.clone(), &data)
            .await
            .unwrap();
        assert_eq!(entity.meta.unwrap().shell.as_deref(), Some("ab"));
    }

    #[tokio::test]
    async fn unhandled_actions_return_record() {
        let context = Context::fixture();
        let manager = PluginManager::fixture(vec![("a", Marker("a"))]);
        let data = Entity::with_id("alice");
        let entity = manager
            .invoke_entity(&context, Action::PreAuthCheck, data.clone(), &data)
            .await
            .unwrap();
        assert_eq!(entity, data);
    }

    #[tokio::test]
    async fn group_invocation() {
        let context = Context::fixture();
        let manager = PluginManager::fixture(vec![("a", Marker("a"))]);
        let data = Group::with_name("eng");
        let group = manager
            .invoke_group(&context, Action::GroupCreate, Group::default(), &data)
            .await
            .unwrap();
        assert_eq!(group.display_name.as_deref(), Some("eng (a)"));
    }

    #[tokio::test]
    async fn plugin_error_aborts() {
        let context = Context::fixture();
        let manager = PluginManager::fixture(vec![("refuse", Refuse)]);
        let data = Entity::with_id("alice");
        let error = manager
            .invoke_entity(&context, Action::EntityUpdate, data.clone(), &data)
            .await
            .unwrap_err();
        assert!(Error::MalformedRequest(String::new()).is_kind(&error));
    }

    #[tokio::test]
    async fn empty_manager_is_noop() {
        let context = Context::fixture();
        let manager = PluginManager::default();
        assert!(manager.is_empty());
        let data = Entity::with_id("alice");
        let entity = manager
            .invoke_entity(&context, Action::EntityCreate, Entity::default(), &data)
            .await
            .unwrap();
        assert_eq!(entity, Entity::default());
    }

    #[tokio::test]
    async fn discover_missing_directory() {
        let context = Context::fixture();
        let opts = DiscoveryOpts {
            path: "/path/that/does/not/exist".into(),
            ..Default::default()
        };
        let manager = PluginManager::discover(&context, &opts).await;
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn discover_static_skips_failures() {
        let context = Context::fixture();
        let opts = DiscoveryOpts {
            loadstatic: true,
            list: vec!["/path/to/missing.treeplugin".into()],
            ..Default::default()
        };
        let manager = PluginManager::discover(&context, &opts).await;
        assert!(manager.is_empty());
    }
}
