//! Typed access to the entities and groups of the NetAuth tree.
//!
//! The [`Db`] wraps a [`Kv`] backend and the [`SearchIndex`]:
//!
//! - Records are encoded and decoded on every access, no caching happens here.
//! - Storage failures are reported as [`Error::InternalError`] while missing records
//!   are reported as [`Error::UnknownEntity`] or [`Error::UnknownGroup`].
//! - The search index is kept up to date by a callback on the [`EventBus`].
//!   When a [`Db`] is opened all existing records are replayed as update events
//!   to warm up the index.
use std::sync::Arc;

use anyhow::Result;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_events::Buffered;
use netauth_events::Event;
use netauth_events::EventBus;
use netauth_events::EventType;
use netauth_kv::keys;
use netauth_kv::Kv;
use netauth_kv::KvCapability;
use netauth_models::codec;
use netauth_models::Entity;
use netauth_models::Group;
use netauth_search::SearchIndex;

mod index;


pub use self::index::IndexUpdater;
pub use self::index::INDEX_CALLBACK;

/// Typed access to stored entities and groups.
#[derive(Clone)]
pub struct Db {
    events: EventBus,
    index: Arc<SearchIndex>,
    kv: Kv,
}

impl Db {
    /// Start building a [`Db`] on top of a [`Kv`] backend.
    pub fn builder(kv: Kv) -> DbBuilder {
        DbBuilder {
            buffer: 0,
            events: EventBus::default(),
            kv,
        }
    }

    /// Stop updating the index and release the storage backend.
    pub async fn close(&self, context: &Context) -> Result<()> {
        self.events.deregister(INDEX_CALLBACK);
        self.kv.close(context).await
    }

    /// Remove an entity from storage.
    pub async fn delete_entity(&self, context: &Context, id: &str) -> Result<()> {
        let key = keys::entity(id);
        self.ensure_exists(context, &key, || Error::UnknownEntity(id.to_string()))
            .await?;
        self.kv
            .del(context, &key)
            .await
            .map_err(|error| storage_error(error, format!("unable to delete entity '{}'", id)))?;
        self.fire_if_silent(context, Event::new(EventType::EntityDestroy, id))
            .await;
        Ok(())
    }

    /// Remove a group from storage.
    pub async fn delete_group(&self, context: &Context, name: &str) -> Result<()> {
        let key = keys::group(name);
        self.ensure_exists(context, &key, || Error::UnknownGroup(name.to_string()))
            .await?;
        self.kv
            .del(context, &key)
            .await
            .map_err(|error| storage_error(error, format!("unable to delete group '{}'", name)))?;
        self.fire_if_silent(context, Event::new(EventType::GroupDestroy, name))
            .await;
        Ok(())
    }

    /// List the IDs of all stored entities.
    pub async fn discover_entity_ids(&self, context: &Context) -> Result<Vec<String>> {
        self.discover(context, keys::ENTITIES_GLOB).await
    }

    /// List the names of all stored groups.
    pub async fn discover_group_names(&self, context: &Context) -> Result<Vec<String>> {
        self.discover(context, keys::GROUPS_GLOB).await
    }

    /// Access the event bus changes to records are reported on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Verify the storage backend is able to serve requests.
    pub async fn health(&self, context: &Context) -> Result<()> {
        self.kv.health(context).await
    }

    /// Load all stored entities.
    pub async fn all_entities(&self, context: &Context) -> Result<Vec<Entity>> {
        let ids = self.discover_entity_ids(context).await?;
        self.load_entities(context, &ids).await
    }

    /// Load all stored groups.
    pub async fn all_groups(&self, context: &Context) -> Result<Vec<Group>> {
        let names = self.discover_group_names(context).await?;
        self.load_groups(context, &names).await
    }

    /// Load a list of entities, failing if any can't be loaded.
    pub async fn load_entities(&self, context: &Context, ids: &[String]) -> Result<Vec<Entity>> {
        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            entities.push(self.load_entity(context, id).await?);
        }
        Ok(entities)
    }

    /// Load an entity by ID.
    pub async fn load_entity(&self, context: &Context, id: &str) -> Result<Entity> {
        let key = keys::entity(id);
        let data = self
            .load(context, &key, || Error::UnknownEntity(id.to_string()))
            .await?;
        codec::decode_entity(&data)
    }

    /// Load a group by name.
    pub async fn load_group(&self, context: &Context, name: &str) -> Result<Group> {
        let key = keys::group(name);
        let data = self
            .load(context, &key, || Error::UnknownGroup(name.to_string()))
            .await?;
        codec::decode_group(&data)
    }

    /// Load a list of groups, failing if any can't be loaded.
    pub async fn load_groups(&self, context: &Context, names: &[String]) -> Result<Vec<Group>> {
        let mut groups = Vec::with_capacity(names.len());
        for name in names {
            groups.push(self.load_group(context, name).await?);
        }
        Ok(groups)
    }

    /// Number to assign to a new entity: one more than the largest in use.
    pub async fn next_entity_number(&self, context: &Context) -> Result<i32> {
        let entities = self.all_entities(context).await?;
        let max = entities.iter().map(|entity| entity.number).max();
        Ok(max.unwrap_or(0).max(0) + 1)
    }

    /// Number to assign to a new group: one more than the largest in use.
    pub async fn next_group_number(&self, context: &Context) -> Result<i32> {
        let groups = self.all_groups(context).await?;
        let max = groups.iter().map(|group| group.number).max();
        Ok(max.unwrap_or(0).max(0) + 1)
    }

    /// Store an entity, replacing any previous version.
    pub async fn save_entity(&self, context: &Context, entity: &Entity) -> Result<()> {
        let key = keys::entity(&entity.id);
        let data = codec::encode_entity(entity);
        self.kv.put(context, &key, data).await.map_err(|error| {
            storage_error(error, format!("unable to save entity '{}'", entity.id))
        })?;
        self.fire_if_silent(context, Event::new(EventType::EntityUpdate, &entity.id))
            .await;
        Ok(())
    }

    /// Store a group, replacing any previous version.
    pub async fn save_group(&self, context: &Context, group: &Group) -> Result<()> {
        let key = keys::group(&group.name);
        let data = codec::encode_group(group);
        self.kv.put(context, &key, data).await.map_err(|error| {
            storage_error(error, format!("unable to save group '{}'", group.name))
        })?;
        self.fire_if_silent(context, Event::new(EventType::GroupUpdate, &group.name))
            .await;
        Ok(())
    }

    /// Entities matching a search expression.
    pub async fn search_entities(&self, context: &Context, expression: &str) -> Result<Vec<Entity>> {
        let ids = self.index.search_entities(expression)?;
        self.load_entities(context, &ids).await
    }

    /// Groups matching a search expression.
    pub async fn search_groups(&self, context: &Context, expression: &str) -> Result<Vec<Group>> {
        let names = self.index.search_groups(expression)?;
        self.load_groups(context, &names).await
    }

    async fn discover(&self, context: &Context, pattern: &str) -> Result<Vec<String>> {
        let found = self
            .kv
            .keys(context, pattern)
            .await
            .map_err(|error| storage_error(error, "unable to list records".to_string()))?;
        let found = found
            .iter()
            .filter_map(|key| keys::primary_key(key))
            .filter(|pk| !pk.is_empty())
            .map(String::from)
            .collect();
        Ok(found)
    }

    async fn ensure_exists<F>(&self, context: &Context, key: &str, missing: F) -> Result<()>
    where
        F: FnOnce() -> Error,
    {
        self.load(context, key, missing).await?;
        Ok(())
    }

    /// Fire an event for backends that don't emit them on their own.
    async fn fire_if_silent(&self, context: &Context, event: Event) {
        if !self.kv.has_capability(KvCapability::EmitsEvents) {
            self.events.fire(context, event).await;
        }
    }

    async fn load<F>(&self, context: &Context, key: &str, missing: F) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Error,
    {
        match self.kv.get(context, key).await {
            Ok(data) => Ok(data),
            Err(error) if Error::NoValue(String::new()).is_kind(&error) => {
                anyhow::bail!(missing())
            }
            Err(error) => Err(storage_error(error, format!("unable to load '{}'", key))),
        }
    }

    /// Replay update events for all stored records.
    async fn warm_up(&self, context: &Context) -> Result<()> {
        let ids = self.discover_entity_ids(context).await?;
        let names = self.discover_group_names(context).await?;
        slog::info!(
            context.logger, "Warming up search index";
            "entities" => ids.len(),
            "groups" => names.len(),
        );
        for id in ids {
            let event = Event::new(EventType::EntityUpdate, id);
            self.events.fire(context, event).await;
        }
        for name in names {
            let event = Event::new(EventType::GroupUpdate, name);
            self.events.fire(context, event).await;
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Db {
    /// Open a [`Db`] over an empty in-memory backend for unit tests.
    pub async fn fixture(context: &Context) -> Db {
        Db::builder(Kv::fixture())
            .open(context)
            .await
            .expect("in-memory Db to open")
    }
}

/// Configure and open a [`Db`].
pub struct DbBuilder {
    buffer: usize,
    events: EventBus,
    kv: Kv,
}

impl DbBuilder {
    /// Queue up to `buffer` events between storage and the search index.
    ///
    /// With a buffer of 0 (the default) the index is updated before writes complete.
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Use an existing [`EventBus`] shared with other components.
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Connect storage, index and events then warm up the index.
    pub async fn open(self, context: &Context) -> Result<Db> {
        let db = Db {
            events: self.events,
            index: Arc::new(SearchIndex::default()),
            kv: self.kv,
        };
        db.kv.set_events(db.events.clone());

        let updater = IndexUpdater {
            index: Arc::clone(&db.index),
            kv: db.kv.clone(),
        };
        if self.buffer > 0 {
            let updater = Buffered::spawn(context, self.buffer, updater);
            db.events.register(INDEX_CALLBACK, updater);
        } else {
            db.events.register(INDEX_CALLBACK, updater);
        }

        db.warm_up(context).await?;
        Ok(db)
    }
}

/// Attach an [`Error::InternalError`] to storage failures not already carrying a meaning.
fn storage_error(error: anyhow::Error, reason: String) -> anyhow::Error {
    match Error::find(&error) {
        Some(Error::Cancelled | Error::MalformedRequest(_) | Error::ReadOnly) => error,
        _ => error.context(Error::internal(reason)),
    }
}
