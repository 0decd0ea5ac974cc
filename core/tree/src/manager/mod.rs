//! The tree manager is the entry point to read and change the tree.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;

use netauth_context::Context;
use netauth_crypto::Crypto;
use netauth_db::Db;
use netauth_models::Capability;
use netauth_models::Entity;
use netauth_models::EntityMeta;
use netauth_models::Group;
use netauth_plugin::PluginManager;

use crate::chain;
use crate::chain::ChainConfig;
use crate::chain::Chains;
use crate::hook::HookRegistryBuilder;
use crate::hook::RefContext;

mod entity;
mod group;

#[cfg(test)]
mod tests;

/// How [`Manager::entity_keys`] handles a key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyMode {
    Add,
    Del,
    Read,
}

/// How untyped metadata requests handle the key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetaMode {
    Read,
    Upsert,
    ClearFuzzy,
    ClearExact,
}

/// Read and change the entities and groups of the tree.
///
/// Every change is performed by running a chain of hooks.
/// Reads that don't need hooks go to the [`Db`] directly.
/// Entities returned by the manager never carry the stored secret.
#[derive(Clone)]
pub struct Manager {
    bootstrap_done: Arc<AtomicBool>,
    chains: Arc<Chains>,
    db: Db,
    plugins: PluginManager,
}

impl Manager {
    /// Start building a [`Manager`] over the given storage and crypto provider.
    pub fn builder(db: Db, crypto: Crypto) -> ManagerBuilder {
        ManagerBuilder {
            chains: ChainConfig::defaults(),
            crypto,
            db,
            hooks: HookRegistryBuilder::default(),
            plugins: PluginManager::default(),
        }
    }

    /// Ensure an entity with the given ID and secret holds [`Capability::GlobalRoot`].
    ///
    /// Only the first call in the process has any effect.
    pub async fn bootstrap(&self, context: &Context, id: &str, secret: &str) -> Result<()> {
        if self.bootstrap_done.swap(true, Ordering::SeqCst) {
            slog::debug!(context.logger, "Bootstrap already done, skipping");
            return Ok(());
        }

        slog::info!(context.logger, "Bootstrapping server"; "entity" => id);
        let request = Entity {
            id: id.to_string(),
            secret: secret.to_string(),
            meta: Some(EntityMeta {
                capabilities: vec![Capability::GlobalRoot as i32],
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = self
            .run_entity_chain(context, chain::BOOTSTRAP_SERVER, &request)
            .await;
        if result.is_err() {
            self.bootstrap_done.store(false, Ordering::SeqCst);
        }
        result.map(|_| ())
    }

    /// Disable bootstrap if an entity already holds [`Capability::GlobalRoot`].
    pub async fn check_required_entities(&self, context: &Context) -> Result<()> {
        let entities = self.db.all_entities(context).await?;
        let root = entities
            .iter()
            .find(|entity| entity.has_capability(Capability::GlobalRoot));
        if let Some(root) = root {
            slog::info!(
                context.logger, "Entity with GLOBAL_ROOT found, bootstrap disabled";
                "entity" => &root.id,
            );
            self.disable_bootstrap();
        }
        Ok(())
    }

    /// Prevent [`Manager::bootstrap`] from having any effect.
    pub fn disable_bootstrap(&self) {
        self.bootstrap_done.store(true, Ordering::SeqCst);
    }

    /// Assembled chains, mostly useful for introspection.
    pub fn chains(&self) -> &Chains {
        &self.chains
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    /// Run an entity chain by name.
    pub async fn run_entity_chain(
        &self,
        context: &Context,
        chain: &str,
        request: &Entity,
    ) -> Result<Entity> {
        let context = context
            .derive()
            .log_values(slog::o!("chain" => chain.to_string(), "entity" => request.id.clone()))
            .build();
        self.chains.run_entity(&context, chain, request).await
    }

    /// Run a group chain by name.
    pub async fn run_group_chain(
        &self,
        context: &Context,
        chain: &str,
        request: &Group,
    ) -> Result<Group> {
        let context = context
            .derive()
            .log_values(slog::o!("chain" => chain.to_string(), "group" => request.name.clone()))
            .build();
        self.chains.run_group(&context, chain, request).await
    }
}

/// Configure and assemble a [`Manager`].
pub struct ManagerBuilder {
    chains: ChainConfig,
    crypto: Crypto,
    db: Db,
    hooks: HookRegistryBuilder,
    plugins: PluginManager,
}

impl ManagerBuilder {
    /// Change the chain configuration before it is assembled.
    pub fn chains<F>(mut self, update: F) -> Self
    where
        F: FnOnce(&mut ChainConfig),
    {
        update(&mut self.chains);
        self
    }

    /// Register additional hook constructors.
    pub fn hooks<F>(mut self, register: F) -> Result<Self>
    where
        F: FnOnce(&mut HookRegistryBuilder) -> Result<()>,
    {
        register(&mut self.hooks)?;
        Ok(self)
    }

    /// Invoke the given plugins from the chains.
    pub fn plugins(mut self, plugins: PluginManager) -> Self {
        self.plugins = plugins;
        self
    }

    /// Construct all hooks and assemble the chains.
    ///
    /// Missing, empty or broken chains fail the build.
    pub fn build(self, context: &Context) -> Result<Manager> {
        let mut hooks = self.hooks;
        crate::hooks::register_defaults(&mut hooks)?;
        let refs = RefContext {
            crypto: self.crypto,
            db: self.db.clone(),
            plugins: self.plugins.clone(),
        };
        let registry = hooks.finish(context, &refs);

        let mut config = self.chains;
        config.splice_plugins();
        let chains = Chains::assemble(context, &config, &registry)?;
        Ok(Manager {
            bootstrap_done: Arc::new(AtomicBool::new(false)),
            chains: Arc::new(chains),
            db: self.db,
            plugins: self.plugins,
        })
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Manager {
    /// Manager over an empty in-memory store, pass-through crypto and no plugins.
    pub async fn fixture(context: &Context) -> Manager {
        let db = Db::fixture(context).await;
        Manager::builder(db, Crypto::fixture())
            .build(context)
            .expect("default chains to assemble")
    }
}
