//! Group operations of the tree manager.
use anyhow::Result;

use netauth_context::Context;
use netauth_models::kv;
use netauth_models::untyped;
use netauth_models::Capability;
use netauth_models::Entity;
use netauth_models::ExpansionRule;
use netauth_models::Group;
use netauth_models::KvData;
use netauth_models::RuleMode;

use super::Manager;
use super::MetaMode;
use crate::chain;
use crate::graph::GroupGraph;

impl Manager {
    /// Create a new group.
    ///
    /// A `number` below 1 allocates the next free number.
    /// An empty `managed_by` creates an unmanaged group.
    pub async fn create_group(
        &self,
        context: &Context,
        name: &str,
        display_name: &str,
        managed_by: &str,
        number: i32,
    ) -> Result<()> {
        let request = Group {
            name: name.to_string(),
            display_name: Some(display_name.to_string()).filter(|value| !value.is_empty()),
            managed_by: Some(managed_by.to_string()),
            number,
            ..Default::default()
        };
        self.run_group_chain(context, chain::CREATE, &request)
            .await?;
        Ok(())
    }

    pub async fn fetch_group(&self, context: &Context, name: &str) -> Result<Group> {
        self.run_group_chain(context, chain::FETCH, &Group::with_name(name))
            .await
    }

    pub async fn destroy_group(&self, context: &Context, name: &str) -> Result<()> {
        self.run_group_chain(context, chain::DESTROY, &Group::with_name(name))
            .await?;
        Ok(())
    }

    /// Update the display name and managing group of a group.
    ///
    /// Other fields of `update` are ignored.
    pub async fn update_group_meta(&self, context: &Context, update: &Group) -> Result<()> {
        let request = Group {
            name: update.name.clone(),
            display_name: update.display_name.clone(),
            managed_by: update.managed_by.clone(),
            ..Default::default()
        };
        self.run_group_chain(context, chain::MERGE_METADATA, &request)
            .await?;
        Ok(())
    }

    /// Read or change the untyped metadata of a group.
    pub async fn group_um(
        &self,
        context: &Context,
        name: &str,
        mode: MetaMode,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>> {
        let (chain, raw) = match mode {
            MetaMode::Read => {
                let group = self.fetch_group(context, name).await?;
                return Ok(untyped::read(&group.untyped_meta, key)?);
            }
            MetaMode::Upsert => {
                untyped::check_key(key)?;
                (chain::UGM_UPSERT, format!("{}:{}", key, value))
            }
            MetaMode::ClearFuzzy => (chain::UGM_CLEARFUZZY, key.to_string()),
            MetaMode::ClearExact => (chain::UGM_CLEAREXACT, key.to_string()),
        };
        let request = Group {
            name: name.to_string(),
            untyped_meta: vec![raw],
            ..Default::default()
        };
        self.run_group_chain(context, chain, &request).await?;
        Ok(Vec::new())
    }

    pub async fn set_group_capability(
        &self,
        context: &Context,
        name: &str,
        capability: Capability,
    ) -> Result<()> {
        let request = Group {
            name: name.to_string(),
            capabilities: vec![capability as i32],
            ..Default::default()
        };
        self.run_group_chain(context, chain::SET_CAPABILITY, &request)
            .await?;
        Ok(())
    }

    pub async fn drop_group_capability(
        &self,
        context: &Context,
        name: &str,
        capability: Capability,
    ) -> Result<()> {
        let request = Group {
            name: name.to_string(),
            capabilities: vec![capability as i32],
            ..Default::default()
        };
        self.run_group_chain(context, chain::DROP_CAPABILITY, &request)
            .await?;
        Ok(())
    }

    /// Add or drop an expansion rule of a group.
    pub async fn modify_group_rule(
        &self,
        context: &Context,
        name: &str,
        target: &str,
        mode: RuleMode,
    ) -> Result<()> {
        let rule = ExpansionRule::new(mode, target);
        let request = Group {
            name: name.to_string(),
            expansions: vec![rule.to_string()],
            ..Default::default()
        };
        self.run_group_chain(context, chain::MODIFY_EXPANSIONS, &request)
            .await?;
        Ok(())
    }

    /// Effective members of a group, without their secrets.
    ///
    /// The [`crate::ALL_GROUP`] pseudo-group lists every entity, locked or not.
    pub async fn list_members(&self, context: &Context, name: &str) -> Result<Vec<Entity>> {
        let entities = self.db().all_entities(context).await?;
        if name == crate::ALL_GROUP {
            return Ok(entities.iter().map(Entity::redacted).collect());
        }

        self.db().load_group(context, name).await?;
        let groups = self.db().all_groups(context).await?;
        let graph = GroupGraph::from_groups(&groups);
        let members = entities
            .iter()
            .filter(|entity| {
                let direct = match &entity.meta {
                    None => return false,
                    Some(meta) => &meta.groups,
                };
                graph.memberships(direct).contains(name)
            })
            .map(Entity::redacted)
            .collect();
        Ok(members)
    }

    pub async fn search_groups(&self, context: &Context, expression: &str) -> Result<Vec<Group>> {
        self.db().search_groups(context, expression).await
    }

    pub async fn group_kv_add(&self, context: &Context, name: &str, record: KvData) -> Result<()> {
        let request = Group {
            name: name.to_string(),
            kv: vec![record],
            ..Default::default()
        };
        self.run_group_chain(context, chain::KV_ADD, &request)
            .await?;
        Ok(())
    }

    /// Read key/value records of a group by key, or all records with `*`.
    pub async fn group_kv_get(&self, context: &Context, name: &str, key: &str) -> Result<Vec<KvData>> {
        let group = self.db().load_group(context, name).await?;
        Ok(kv::read(&group.kv, key)?)
    }

    pub async fn group_kv_del(&self, context: &Context, name: &str, key: &str) -> Result<()> {
        let request = Group {
            name: name.to_string(),
            kv: vec![KvData {
                key: key.to_string(),
                values: Vec::new(),
            }],
            ..Default::default()
        };
        self.run_group_chain(context, chain::KV_DEL, &request)
            .await?;
        Ok(())
    }

    pub async fn group_kv_replace(&self, context: &Context, name: &str, record: KvData) -> Result<()> {
        let request = Group {
            name: name.to_string(),
            kv: vec![record],
            ..Default::default()
        };
        self.run_group_chain(context, chain::KV_REPLACE, &request)
            .await?;
        Ok(())
    }
}
