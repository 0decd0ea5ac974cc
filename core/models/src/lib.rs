//! Data model of the NetAuth tree: entities, groups and their metadata.
//!
//! Entities and groups are protocol buffer messages so the same types serve as
//! in-memory records, on-disk records and plugin payloads (encoded as JSON).
pub mod capability;
pub mod codec;
pub mod entity;
pub mod expansion;
pub mod group;
pub mod kv;
pub mod untyped;

pub use self::capability::Capability;
pub use self::entity::Entity;
pub use self::entity::EntityMeta;
pub use self::entity::REDACTED_SECRET;
pub use self::expansion::ExpansionRule;
pub use self::expansion::RuleMode;
pub use self::group::Group;
pub use self::kv::KvData;
pub use self::kv::KvValue;
pub use self::untyped::UntypedEntry;
