//! Entity operations of the tree manager.
use anyhow::Result;

use netauth_context::Context;
use netauth_models::kv;
use netauth_models::untyped;
use netauth_models::Capability;
use netauth_models::Entity;
use netauth_models::EntityMeta;
use netauth_models::KvData;

use super::KeyMode;
use super::Manager;
use super::MetaMode;
use crate::chain;
use crate::graph::GroupGraph;

/// Wildcard key type matching keys of any type.
const ANY_KEY_TYPE: &str = "*";

fn with_meta(id: &str, meta: EntityMeta) -> Entity {
    Entity {
        id: id.to_string(),
        meta: Some(meta),
        ..Default::default()
    }
}

impl Manager {
    /// Create a new entity.
    ///
    /// A `number` below 1 allocates the next free number.
    pub async fn create_entity(
        &self,
        context: &Context,
        id: &str,
        number: i32,
        secret: &str,
    ) -> Result<()> {
        let request = Entity {
            id: id.to_string(),
            number,
            secret: secret.to_string(),
            meta: None,
        };
        self.run_entity_chain(context, chain::CREATE, &request)
            .await?;
        Ok(())
    }

    /// Fetch an entity, without its secret.
    pub async fn fetch_entity(&self, context: &Context, id: &str) -> Result<Entity> {
        let entity = self
            .run_entity_chain(context, chain::FETCH, &Entity::with_id(id))
            .await?;
        Ok(entity.redacted())
    }

    pub async fn destroy_entity(&self, context: &Context, id: &str) -> Result<()> {
        self.run_entity_chain(context, chain::DESTROY, &Entity::with_id(id))
            .await?;
        Ok(())
    }

    /// Replace the secret of an entity.
    pub async fn set_entity_secret(&self, context: &Context, id: &str, secret: &str) -> Result<()> {
        let request = Entity {
            id: id.to_string(),
            secret: secret.to_string(),
            ..Default::default()
        };
        self.run_entity_chain(context, chain::SET_SECRET, &request)
            .await?;
        Ok(())
    }

    /// Check the secret of an entity.
    ///
    /// Locked entities fail validation regardless of the secret.
    pub async fn validate_secret(&self, context: &Context, id: &str, secret: &str) -> Result<()> {
        let request = Entity {
            id: id.to_string(),
            secret: secret.to_string(),
            ..Default::default()
        };
        self.run_entity_chain(context, chain::VALIDATE_IDENTITY, &request)
            .await?;
        Ok(())
    }

    pub async fn set_entity_capability(
        &self,
        context: &Context,
        id: &str,
        capability: Capability,
    ) -> Result<()> {
        let meta = EntityMeta {
            capabilities: vec![capability as i32],
            ..Default::default()
        };
        self.run_entity_chain(context, chain::SET_CAPABILITY, &with_meta(id, meta))
            .await?;
        Ok(())
    }

    pub async fn drop_entity_capability(
        &self,
        context: &Context,
        id: &str,
        capability: Capability,
    ) -> Result<()> {
        let meta = EntityMeta {
            capabilities: vec![capability as i32],
            ..Default::default()
        };
        self.run_entity_chain(context, chain::DROP_CAPABILITY, &with_meta(id, meta))
            .await?;
        Ok(())
    }

    /// Add, remove or list the keys of an entity.
    ///
    /// Keys are stored as `TYPE:material`, the type is upper-cased.
    /// Reads return the keys of the given type, or all keys for `*`.
    /// Changes return an empty list.
    pub async fn entity_keys(
        &self,
        context: &Context,
        id: &str,
        mode: KeyMode,
        key_type: &str,
        key: &str,
    ) -> Result<Vec<String>> {
        let key_type = key_type.to_uppercase();
        let chain = match mode {
            KeyMode::Add => chain::ADD_KEY,
            KeyMode::Del => chain::DEL_KEY,
            KeyMode::Read => {
                let entity = self.fetch_entity(context, id).await?;
                let keys = entity.meta.unwrap_or_default().keys;
                if key_type == ANY_KEY_TYPE {
                    return Ok(keys);
                }
                let prefix = format!("{}:", key_type);
                let keys = keys
                    .into_iter()
                    .filter(|key| key.starts_with(&prefix))
                    .collect();
                return Ok(keys);
            }
        };
        let meta = EntityMeta {
            keys: vec![format!("{}:{}", key_type, key)],
            ..Default::default()
        };
        self.run_entity_chain(context, chain, &with_meta(id, meta))
            .await?;
        Ok(Vec::new())
    }

    /// Merge the given metadata into the metadata of an entity.
    ///
    /// Capabilities, groups, keys and key/value metadata are ignored.
    pub async fn update_entity_meta(
        &self,
        context: &Context,
        id: &str,
        meta: EntityMeta,
    ) -> Result<()> {
        self.run_entity_chain(context, chain::MERGE_METADATA, &with_meta(id, meta))
            .await?;
        Ok(())
    }

    pub async fn lock_entity(&self, context: &Context, id: &str) -> Result<()> {
        self.run_entity_chain(context, chain::LOCK, &Entity::with_id(id))
            .await?;
        Ok(())
    }

    pub async fn unlock_entity(&self, context: &Context, id: &str) -> Result<()> {
        self.run_entity_chain(context, chain::UNLOCK, &Entity::with_id(id))
            .await?;
        Ok(())
    }

    /// Read or change the untyped metadata of an entity.
    ///
    /// Reads return matching `key:value` entries, changes return an empty list.
    pub async fn entity_um(
        &self,
        context: &Context,
        id: &str,
        mode: MetaMode,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>> {
        let (chain, raw) = match mode {
            MetaMode::Read => {
                let entity = self.fetch_entity(context, id).await?;
                let list = entity.meta.unwrap_or_default().untyped_meta;
                return Ok(untyped::read(&list, key)?);
            }
            MetaMode::Upsert => {
                untyped::check_key(key)?;
                (chain::UEM_UPSERT, format!("{}:{}", key, value))
            }
            MetaMode::ClearFuzzy => (chain::UEM_CLEARFUZZY, key.to_string()),
            MetaMode::ClearExact => (chain::UEM_CLEAREXACT, key.to_string()),
        };
        let meta = EntityMeta {
            untyped_meta: vec![raw],
            ..Default::default()
        };
        self.run_entity_chain(context, chain, &with_meta(id, meta))
            .await?;
        Ok(Vec::new())
    }

    /// Make an entity a direct member of an existing group.
    pub async fn add_entity_to_group(&self, context: &Context, id: &str, group: &str) -> Result<()> {
        self.db().load_group(context, group).await?;
        let meta = EntityMeta {
            groups: vec![group.to_string()],
            ..Default::default()
        };
        self.run_entity_chain(context, chain::GROUP_ADD, &with_meta(id, meta))
            .await?;
        Ok(())
    }

    /// Remove a direct membership of an entity.
    pub async fn remove_entity_from_group(
        &self,
        context: &Context,
        id: &str,
        group: &str,
    ) -> Result<()> {
        let meta = EntityMeta {
            groups: vec![group.to_string()],
            ..Default::default()
        };
        self.run_entity_chain(context, chain::GROUP_DEL, &with_meta(id, meta))
            .await?;
        Ok(())
    }

    pub async fn entity_kv_add(&self, context: &Context, id: &str, record: KvData) -> Result<()> {
        let meta = EntityMeta {
            kv: vec![record],
            ..Default::default()
        };
        self.run_entity_chain(context, chain::KV_ADD, &with_meta(id, meta))
            .await?;
        Ok(())
    }

    /// Read key/value records of an entity by key, or all records with `*`.
    pub async fn entity_kv_get(&self, context: &Context, id: &str, key: &str) -> Result<Vec<KvData>> {
        let entity = self.db().load_entity(context, id).await?;
        let records = entity.meta.unwrap_or_default().kv;
        Ok(kv::read(&records, key)?)
    }

    pub async fn entity_kv_del(&self, context: &Context, id: &str, key: &str) -> Result<()> {
        let meta = EntityMeta {
            kv: vec![KvData {
                key: key.to_string(),
                values: Vec::new(),
            }],
            ..Default::default()
        };
        self.run_entity_chain(context, chain::KV_DEL, &with_meta(id, meta))
            .await?;
        Ok(())
    }

    pub async fn entity_kv_replace(&self, context: &Context, id: &str, record: KvData) -> Result<()> {
        let meta = EntityMeta {
            kv: vec![record],
            ..Default::default()
        };
        self.run_entity_chain(context, chain::KV_REPLACE, &with_meta(id, meta))
            .await?;
        Ok(())
    }

    /// Entities matching a search expression, without their secrets.
    pub async fn search_entities(&self, context: &Context, expression: &str) -> Result<Vec<Entity>> {
        let entities = self.db().search_entities(context, expression).await?;
        Ok(entities.iter().map(Entity::redacted).collect())
    }

    /// Groups an entity is a member of.
    ///
    /// With `indirect` set, memberships gained and lost through expansion rules are
    /// resolved against the current groups.
    pub async fn get_memberships(
        &self,
        context: &Context,
        entity: &Entity,
        indirect: bool,
    ) -> Result<Vec<String>> {
        let direct = entity
            .meta
            .as_ref()
            .map(|meta| meta.groups.clone())
            .unwrap_or_default();
        if !indirect {
            return Ok(direct);
        }
        let groups = self.db().all_groups(context).await?;
        let graph = GroupGraph::from_groups(&groups);
        Ok(graph.memberships(&direct).into_iter().collect())
    }
}
