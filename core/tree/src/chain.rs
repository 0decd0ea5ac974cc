//! Chains are named, priority-sorted lists of hooks executed for one tree operation.
//!
//! Chains are described by a [`ChainConfig`] (hook names per chain) and assembled
//! once at startup against a [`HookRegistry`] into immutable [`Chains`].
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_models::Entity;
use netauth_models::Group;
use netauth_plugin::Action;

use crate::hook::EntityHook;
use crate::hook::GroupHook;
use crate::hook::HookRegistry;

pub const CREATE: &str = "CREATE";
pub const DESTROY: &str = "DESTROY";
pub const FETCH: &str = "FETCH";
pub const BOOTSTRAP_SERVER: &str = "BOOTSTRAP-SERVER";
pub const SET_SECRET: &str = "SET-SECRET";
pub const SET_CAPABILITY: &str = "SET-CAPABILITY";
pub const DROP_CAPABILITY: &str = "DROP-CAPABILITY";
pub const ADD_KEY: &str = "ADD-KEY";
pub const DEL_KEY: &str = "DEL-KEY";
pub const VALIDATE_IDENTITY: &str = "VALIDATE-IDENTITY";
pub const MERGE_METADATA: &str = "MERGE-METADATA";
pub const LOCK: &str = "LOCK";
pub const UNLOCK: &str = "UNLOCK";
pub const UEM_UPSERT: &str = "UEM-UPSERT";
pub const UEM_CLEARFUZZY: &str = "UEM-CLEARFUZZY";
pub const UEM_CLEAREXACT: &str = "UEM-CLEAREXACT";
pub const GROUP_ADD: &str = "GROUP-ADD";
pub const GROUP_DEL: &str = "GROUP-DEL";
pub const KV_ADD: &str = "KV-ADD";
pub const KV_DEL: &str = "KV-DEL";
pub const KV_REPLACE: &str = "KV-REPLACE";
pub const UGM_UPSERT: &str = "UGM-UPSERT";
pub const UGM_CLEARFUZZY: &str = "UGM-CLEARFUZZY";
pub const UGM_CLEAREXACT: &str = "UGM-CLEAREXACT";
pub const MODIFY_EXPANSIONS: &str = "MODIFY-EXPANSIONS";

/// Names of the hooks making up each chain.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChainConfig {
    pub entity: BTreeMap<String, Vec<String>>,
    pub group: BTreeMap<String, Vec<String>>,
}

impl ChainConfig {
    /// Add a hook to an entity chain, creating the chain if needed.
    pub fn splice_entity(&mut self, chain: &str, hook: &str) {
        let hooks = self.entity.entry(chain.to_string()).or_default();
        if !hooks.iter().any(|name| name == hook) {
            hooks.push(hook.to_string());
        }
    }

    /// Add a hook to a group chain, creating the chain if needed.
    pub fn splice_group(&mut self, chain: &str, hook: &str) {
        let hooks = self.group.entry(chain.to_string()).or_default();
        if !hooks.iter().any(|name| name == hook) {
            hooks.push(hook.to_string());
        }
    }

    /// Add the plugin hooks to the chains that invoke them.
    pub fn splice_plugins(&mut self) {
        for (chain, action) in ENTITY_PLUGIN_SPLICES {
            self.splice_entity(chain, &action.hook_name());
        }
        for (chain, action) in GROUP_PLUGIN_SPLICES {
            self.splice_group(chain, &action.hook_name());
        }
    }
}

impl ChainConfig {
    /// Chains the tree needs to operate.
    pub fn defaults() -> ChainConfig {
        let mut config = ChainConfig::default();
        for (chain, hooks) in DEFAULT_ENTITY_CHAINS {
            let hooks = hooks.iter().map(|hook| hook.to_string()).collect();
            config.entity.insert(chain.to_string(), hooks);
        }
        for (chain, hooks) in DEFAULT_GROUP_CHAINS {
            let hooks = hooks.iter().map(|hook| hook.to_string()).collect();
            config.group.insert(chain.to_string(), hooks);
        }
        config
    }
}

const DEFAULT_ENTITY_CHAINS: &[(&str, &[&str])] = &[
    (
        CREATE,
        &[
            "fail-on-existing-entity",
            "set-entity-id",
            "set-entity-number",
            "set-entity-secret",
            "save-entity",
        ],
    ),
    (DESTROY, &["load-entity", "destroy-entity"]),
    (FETCH, &["load-entity"]),
    (
        BOOTSTRAP_SERVER,
        &[
            "create-entity-if-missing",
            "ensure-entity-meta",
            "unlock-entity",
            "set-entity-secret",
            "set-entity-capability",
            "save-entity",
        ],
    ),
    (SET_SECRET, &["load-entity", "set-entity-secret", "save-entity"]),
    (
        SET_CAPABILITY,
        &["load-entity", "ensure-entity-meta", "set-entity-capability", "save-entity"],
    ),
    (
        DROP_CAPABILITY,
        &["load-entity", "ensure-entity-meta", "remove-entity-capability", "save-entity"],
    ),
    (
        ADD_KEY,
        &["load-entity", "ensure-entity-meta", "add-entity-key", "save-entity"],
    ),
    (
        DEL_KEY,
        &["load-entity", "ensure-entity-meta", "del-entity-key", "save-entity"],
    ),
    (
        VALIDATE_IDENTITY,
        &[
            "load-entity",
            "validate-entity-unlocked",
            "validate-entity-secret",
            "save-entity",
        ],
    ),
    (
        MERGE_METADATA,
        &["load-entity", "ensure-entity-meta", "merge-entity-meta", "save-entity"],
    ),
    (LOCK, &["load-entity", "ensure-entity-meta", "lock-entity", "save-entity"]),
    (
        UNLOCK,
        &["load-entity", "ensure-entity-meta", "unlock-entity", "save-entity"],
    ),
    (
        UEM_UPSERT,
        &["load-entity", "ensure-entity-meta", "add-untyped-metadata", "save-entity"],
    ),
    (
        UEM_CLEARFUZZY,
        &[
            "load-entity",
            "ensure-entity-meta",
            "del-untyped-metadata-fuzzy",
            "save-entity",
        ],
    ),
    (
        UEM_CLEAREXACT,
        &[
            "load-entity",
            "ensure-entity-meta",
            "del-untyped-metadata-exact",
            "save-entity",
        ],
    ),
    (
        GROUP_ADD,
        &["load-entity", "ensure-entity-meta", "add-direct-group", "save-entity"],
    ),
    (
        GROUP_DEL,
        &["load-entity", "ensure-entity-meta", "del-direct-group", "save-entity"],
    ),
    (KV_ADD, &["load-entity", "ensure-entity-meta", "kv-add", "save-entity"]),
    (KV_DEL, &["load-entity", "ensure-entity-meta", "kv-del", "save-entity"]),
    (
        KV_REPLACE,
        &["load-entity", "ensure-entity-meta", "kv-replace", "save-entity"],
    ),
];

const DEFAULT_GROUP_CHAINS: &[(&str, &[&str])] = &[
    (
        CREATE,
        &[
            "fail-on-existing-group",
            "set-group-name",
            "set-group-number",
            "set-group-displayname",
            "set-managing-group",
            "save-group",
        ],
    ),
    (DESTROY, &["load-group", "destroy-group"]),
    (FETCH, &["load-group"]),
    (
        MERGE_METADATA,
        &["load-group", "set-managing-group", "merge-group-meta", "save-group"],
    ),
    (SET_CAPABILITY, &["load-group", "set-group-capability", "save-group"]),
    (DROP_CAPABILITY, &["load-group", "remove-group-capability", "save-group"]),
    (UGM_UPSERT, &["load-group", "add-untyped-metadata", "save-group"]),
    (
        UGM_CLEARFUZZY,
        &["load-group", "del-untyped-metadata-fuzzy", "save-group"],
    ),
    (
        UGM_CLEAREXACT,
        &["load-group", "del-untyped-metadata-exact", "save-group"],
    ),
    (KV_ADD, &["load-group", "kv-add", "save-group"]),
    (KV_DEL, &["load-group", "kv-del", "save-group"]),
    (KV_REPLACE, &["load-group", "kv-replace", "save-group"]),
    (
        MODIFY_EXPANSIONS,
        &[
            "load-group",
            "check-expansion-targets",
            "check-immediate-expansions",
            "check-expansion-cycles",
            "patch-group-expansions",
            "save-group",
        ],
    ),
];

const ENTITY_PLUGIN_SPLICES: &[(&str, Action)] = &[
    (CREATE, Action::EntityCreate),
    (DESTROY, Action::EntityDestroy),
    (SET_SECRET, Action::PreSecretChange),
    (SET_SECRET, Action::PostSecretChange),
    (VALIDATE_IDENTITY, Action::PreAuthCheck),
    (VALIDATE_IDENTITY, Action::PostAuthCheck),
    (LOCK, Action::EntityLock),
    (UNLOCK, Action::EntityUnlock),
    (MERGE_METADATA, Action::EntityUpdate),
    (UEM_UPSERT, Action::EntityUpdate),
    (UEM_CLEARFUZZY, Action::EntityUpdate),
    (UEM_CLEAREXACT, Action::EntityUpdate),
];

const GROUP_PLUGIN_SPLICES: &[(&str, Action)] = &[
    (CREATE, Action::GroupCreate),
    (MERGE_METADATA, Action::GroupUpdate),
    (UGM_UPSERT, Action::GroupUpdate),
    (UGM_CLEARFUZZY, Action::GroupUpdate),
    (UGM_CLEAREXACT, Action::GroupUpdate),
    (DESTROY, Action::GroupDestroy),
];

/// Assembled chains, immutable once built.
#[derive(Default)]
pub struct Chains {
    entity: HashMap<String, Vec<Arc<dyn EntityHook>>>,
    group: HashMap<String, Vec<Arc<dyn GroupHook>>>,
}

impl Chains {
    /// Resolve the hooks of every configured chain and sort them by priority.
    ///
    /// Hooks with the same priority keep the order they are configured in.
    /// Assembly fails if a chain is empty or references an unknown hook, or if any
    /// of the default chains is missing.
    pub fn assemble(context: &Context, config: &ChainConfig, registry: &HookRegistry) -> Result<Chains> {
        let mut chains = Chains::default();
        for (name, hooks) in &config.entity {
            if hooks.is_empty() {
                anyhow::bail!(Error::EmptyHookChain(name.clone()));
            }
            let mut chain = Vec::with_capacity(hooks.len());
            for hook in hooks {
                chain.push(registry.entity(hook)?);
            }
            chain.sort_by_key(|hook| hook.priority());
            slog::debug!(
                context.logger, "Assembled entity chain";
                "chain" => name,
                "hooks" => hook_names(chain.iter().map(|hook| hook.name())),
            );
            chains.entity.insert(name.clone(), chain);
        }
        for (name, hooks) in &config.group {
            if hooks.is_empty() {
                anyhow::bail!(Error::EmptyHookChain(name.clone()));
            }
            let mut chain = Vec::with_capacity(hooks.len());
            for hook in hooks {
                chain.push(registry.group(hook)?);
            }
            chain.sort_by_key(|hook| hook.priority());
            slog::debug!(
                context.logger, "Assembled group chain";
                "chain" => name,
                "hooks" => hook_names(chain.iter().map(|hook| hook.name())),
            );
            chains.group.insert(name.clone(), chain);
        }

        for (name, _) in DEFAULT_ENTITY_CHAINS {
            if !chains.entity.contains_key(*name) {
                anyhow::bail!(Error::UnknownHookChain(format!("entity {}", name)));
            }
        }
        for (name, _) in DEFAULT_GROUP_CHAINS {
            if !chains.group.contains_key(*name) {
                anyhow::bail!(Error::UnknownHookChain(format!("group {}", name)));
            }
        }
        Ok(chains)
    }

    /// Names of the hooks of an entity chain, in execution order.
    pub fn entity_hooks(&self, chain: &str) -> Option<Vec<&str>> {
        self.entity
            .get(chain)
            .map(|hooks| hooks.iter().map(|hook| hook.name()).collect())
    }

    /// Names of the hooks of a group chain, in execution order.
    pub fn group_hooks(&self, chain: &str) -> Option<Vec<&str>> {
        self.group
            .get(chain)
            .map(|hooks| hooks.iter().map(|hook| hook.name()).collect())
    }

    /// Run an entity chain and return the resulting entity.
    ///
    /// The first hook to fail aborts the chain.
    pub async fn run_entity(&self, context: &Context, chain: &str, request: &Entity) -> Result<Entity> {
        let hooks = match self.entity.get(chain) {
            Some(hooks) => hooks,
            None => anyhow::bail!(Error::UnknownHookChain(chain.to_string())),
        };
        let mut working = Entity::default();
        for hook in hooks {
            if let Err(error) = hook.run(context, &mut working, request).await {
                slog::debug!(
                    context.logger, "Entity chain aborted";
                    "chain" => chain,
                    "hook" => hook.name(),
                    "error" => format!("{:#}", error),
                );
                return Err(error);
            }
        }
        Ok(working)
    }

    /// Run a group chain and return the resulting group.
    ///
    /// The first hook to fail aborts the chain.
    pub async fn run_group(&self, context: &Context, chain: &str, request: &Group) -> Result<Group> {
        let hooks = match self.group.get(chain) {
            Some(hooks) => hooks,
            None => anyhow::bail!(Error::UnknownHookChain(chain.to_string())),
        };
        let mut working = Group::default();
        for hook in hooks {
            if let Err(error) = hook.run(context, &mut working, request).await {
                slog::debug!(
                    context.logger, "Group chain aborted";
                    "chain" => chain,
                    "hook" => hook.name(),
                    "error" => format!("{:#}", error),
                );
                return Err(error);
            }
        }
        Ok(working)
    }
}

fn hook_names<'a, I>(names: I) -> String
where
    I: Iterator<Item = &'a str>,
{
    names.collect::<Vec<_>>().join(",")
}
