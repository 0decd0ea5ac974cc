//! Wire protocol between the tree and plugin processes.
//!
//! Plugins are started with the [`MAGIC_COOKIE_KEY`] environment variable set to
//! [`MAGIC_COOKIE_VALUE`] and must print the [`handshake`] line on stdout before anything else.
//! After the handshake the tree writes one JSON encoded [`Request`] per line on
//! the plugin's stdin and the plugin answers each with one JSON encoded [`Response`]
//! per line on its stdout.
//! Anything the plugin writes to stderr is left to the plugin.
use serde::Deserialize;
use serde::Serialize;

use netauth_models::Entity;
use netauth_models::Group;

use crate::Action;

/// Environment variable carrying the magic cookie to plugin processes.
pub const MAGIC_COOKIE_KEY: &str = "NETAUTH_TREE_PLUGIN";

/// Value of the magic cookie proving a process was started by the tree.
pub const MAGIC_COOKIE_VALUE: &str = "hyZ1Kw1RJXabLyqM1LmHQ0AgwVqOJbqKEbmvX4Nd";

/// Name of the protocol announced in the handshake.
pub const PROTOCOL_NAME: &str = "netauth-tree";

/// Version of the protocol announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Encoding of messages exchanged after the handshake.
pub const PROTOCOL_ENCODING: &str = "json";

/// Handshake line plugins print once started.
pub fn handshake() -> String {
    format!(
        "{}|{}|{}",
        PROTOCOL_VERSION, PROTOCOL_NAME, PROTOCOL_ENCODING
    )
}

/// Arguments for processing an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityOpts {
    pub action: Action,

    /// The entity as currently known to the chain.
    pub entity: Entity,

    /// The request data the chain was started with.
    pub data_entity: Entity,
}

/// Arguments for processing a group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupOpts {
    pub action: Action,

    /// The group as currently known to the chain.
    pub group: Group,

    /// The request data the chain was started with.
    pub data_group: Group,
}

/// Calls the tree makes to plugins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Call {
    ProcessEntity(EntityOpts),
    ProcessGroup(GroupOpts),
    Shutdown,
}

/// A call with the ID used to match the response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,

    #[serde(flatten)]
    pub call: Call,
}

/// Outcome of a call, successful calls return the processed record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn entity(id: u64, entity: Entity) -> Response {
        Response {
            id,
            entity: Some(entity),
            group: None,
            error: None,
        }
    }

    pub fn failed<S: Into<String>>(id: u64, error: S) -> Response {
        Response {
            id,
            entity: None,
            group: None,
            error: Some(error.into()),
        }
    }

    pub fn group(id: u64, group: Group) -> Response {
        Response {
            id,
            entity: None,
            group: Some(group),
            error: None,
        }
    }
}
