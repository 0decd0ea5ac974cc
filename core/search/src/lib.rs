//! In-memory search index over entities and groups.
//!
//! The index keeps one collection of entity documents and one of group documents.
//! It is fed by the owner of the records (see `netauth-db`), usually in reaction
//! to storage events, and answers [`Query`] expressions with record keys.
//!
//! Sensitive fields are never indexed: entity secrets, entity keys and the untyped
//! metadata of entities and groups.
use std::collections::BTreeMap;
use std::sync::RwLock;

use netauth_errors::Error;
use netauth_models::Entity;
use netauth_models::Group;

mod document;
mod query;

pub use self::document::Document;
pub use self::document::FieldValue;
pub use self::query::Query;

/// Indexed documents keyed by record primary key.
type Collection = BTreeMap<String, Document>;

/// Search entities and groups with free-form query expressions.
#[derive(Default)]
pub struct SearchIndex {
    entities: RwLock<Collection>,
    groups: RwLock<Collection>,
}

impl SearchIndex {
    /// Remove an entity from the index.
    pub fn delete_entity(&self, id: &str) {
        self.entities
            .write()
            .expect("SearchIndex entities lock poisoned")
            .remove(id);
    }

    /// Remove a group from the index.
    pub fn delete_group(&self, name: &str) {
        self.groups
            .write()
            .expect("SearchIndex groups lock poisoned")
            .remove(name);
    }

    /// Number of indexed entities.
    pub fn entity_count(&self) -> usize {
        self.entities
            .read()
            .expect("SearchIndex entities lock poisoned")
            .len()
    }

    /// Number of indexed groups.
    pub fn group_count(&self) -> usize {
        self.groups
            .read()
            .expect("SearchIndex groups lock poisoned")
            .len()
    }

    /// Add or replace an entity in the index.
    pub fn index_entity(&self, entity: &Entity) {
        let document = Document::entity(entity);
        self.entities
            .write()
            .expect("SearchIndex entities lock poisoned")
            .insert(entity.id.clone(), document);
    }

    /// Add or replace a group in the index.
    pub fn index_group(&self, group: &Group) {
        let document = Document::group(group);
        self.groups
            .write()
            .expect("SearchIndex groups lock poisoned")
            .insert(group.name.clone(), document);
    }

    /// IDs of entities matching the expression, best matches first.
    pub fn search_entities(&self, expression: &str) -> Result<Vec<String>, Error> {
        let query = Query::parse(expression)?;
        let entities = self
            .entities
            .read()
            .expect("SearchIndex entities lock poisoned");
        Ok(search(&entities, &query))
    }

    /// Names of groups matching the expression, best matches first.
    pub fn search_groups(&self, expression: &str) -> Result<Vec<String>, Error> {
        let query = Query::parse(expression)?;
        let groups = self.groups.read().expect("SearchIndex groups lock poisoned");
        Ok(search(&groups, &query))
    }
}

fn search(collection: &Collection, query: &Query) -> Vec<String> {
    let mut hits: Vec<(usize, &String)> = collection
        .iter()
        .filter_map(|(key, document)| query.score(document).map(|score| (score, key)))
        .collect();
    hits.sort_by(|(left_score, left), (right_score, right)| {
        right_score.cmp(left_score).then_with(|| left.cmp(right))
    });
    hits.into_iter().map(|(_, key)| key.clone()).collect()
}
