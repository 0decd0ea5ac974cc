//! Flatten records into searchable documents.
use serde_json::Value as Json;

use netauth_models::Capability;
use netauth_models::Entity;
use netauth_models::Group;

/// Record fields that are never indexed.
const ENTITY_EXCLUDED: &[&str] = &["secret", "meta.keys", "meta.untypedmeta"];
const GROUP_EXCLUDED: &[&str] = &["untypedmeta"];

/// A single indexed value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Searchable representation of a record: a list of `(field path, value)` pairs.
///
/// Field paths are dotted and normalised (lower case, without `_`) so that queries
/// can refer to fields as `meta.Shell`, `meta.shell` or `meta.primary_group`.
/// Repeated fields appear once per value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub fields: Vec<(String, FieldValue)>,
}

impl Document {
    /// Build the document for an entity.
    pub fn entity(entity: &Entity) -> Document {
        let capabilities = entity
            .meta
            .as_ref()
            .map(|meta| meta.capability_set())
            .unwrap_or_default();
        let json = serde_json::to_value(entity).unwrap_or(Json::Null);
        let mut document = Document::default();
        document.flatten("", &json, ENTITY_EXCLUDED);
        document.replace_capabilities("meta.capabilities", &capabilities);
        document
    }

    /// Build the document for a group.
    pub fn group(group: &Group) -> Document {
        let json = serde_json::to_value(group).unwrap_or(Json::Null);
        let mut document = Document::default();
        document.flatten("", &json, GROUP_EXCLUDED);
        document.replace_capabilities("capabilities", &group.capability_set());
        document
    }

    fn flatten(&mut self, path: &str, value: &Json, excluded: &[&str]) {
        if excluded.contains(&path) {
            return;
        }
        match value {
            Json::Null => (),
            Json::Bool(value) => self.push(path, FieldValue::Bool(*value)),
            Json::Number(value) => {
                if let Some(value) = value.as_f64() {
                    self.push(path, FieldValue::Number(value));
                }
            }
            Json::String(value) => self.push(path, FieldValue::Text(value.clone())),
            Json::Array(items) => {
                for item in items {
                    self.flatten(path, item, excluded);
                }
            }
            Json::Object(fields) => {
                for (name, value) in fields {
                    let name = normalise(name);
                    let path = match path.is_empty() {
                        true => name,
                        false => format!("{}.{}", path, name),
                    };
                    self.flatten(&path, value, excluded);
                }
            }
        }
    }

    fn push(&mut self, path: &str, value: FieldValue) {
        self.fields.push((path.to_string(), value));
    }

    /// Index capabilities by name instead of wire value.
    fn replace_capabilities(&mut self, path: &str, capabilities: &[Capability]) {
        self.fields.retain(|(field, _)| field != path);
        for capability in capabilities {
            let name = capability.as_str().to_string();
            self.push(path, FieldValue::Text(name));
        }
    }
}

/// Normalise a field name or path for comparison.
pub fn normalise(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use netauth_models::Capability;
    use netauth_models::Entity;
    use netauth_models::Group;

    use super::Document;
    use super::FieldValue;

    fn paths(document: &Document) -> Vec<&str> {
        document
            .fields
            .iter()
            .map(|(path, _)| path.as_str())
            .collect()
    }

    #[test]
    fn entity_excludes_sensitive_fields() {
        let mut entity = Entity::with_id("alice");
        entity.secret = "hashed".into();
        let meta = entity.meta_mut();
        meta.shell = Some("/bin/bash".into());
        meta.keys.push("SSH:ssh-rsa AAAA".into());
        meta.untyped_meta.push("phone:555".into());
        meta.capabilities.push(Capability::CreateGroup as i32);

        let document = Document::entity(&entity);
        let paths = paths(&document);
        assert!(paths.contains(&"id"));
        assert!(paths.contains(&"meta.shell"));
        assert!(!paths.contains(&"secret"));
        assert!(!paths.contains(&"meta.keys"));
        assert!(!paths.contains(&"meta.untypedmeta"));
        assert!(document.fields.contains(&(
            "meta.capabilities".to_string(),
            FieldValue::Text("CREATE_GROUP".into())
        )));
    }

    #[test]
    fn group_excludes_untyped_meta() {
        let mut group = Group::with_name("eng");
        group.display_name = Some("Engineering".into());
        group.untyped_meta.push("room:101".into());
        group.expansions.push("INCLUDE:dev".into());

        let document = Document::group(&group);
        let paths = paths(&document);
        assert!(paths.contains(&"name"));
        assert!(paths.contains(&"displayname"));
        assert!(paths.contains(&"expansions"));
        assert!(!paths.contains(&"untypedmeta"));
    }
}
