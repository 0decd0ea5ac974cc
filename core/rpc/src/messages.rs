//! Request and reply messages exchanged over the RPC surface.
//!
//! Modes and actions are carried as their upper case names (`ADD`, `UPSERT`, `INCLUDE`, ...)
//! and parsed by the service.
use netauth_models::Entity;
use netauth_models::Group;
use netauth_models::KvData;

/// Reply to requests with no result.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Empty {}

/// Present credentials for an entity.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AuthRequest {
    #[prost(string, tag = "1")]
    pub id: String,

    #[prost(string, tag = "2")]
    pub secret: String,
}

/// Bearer token issued to an authenticated entity.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TokenReply {
    #[prost(string, tag = "1")]
    pub token: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ValidateTokenRequest {
    #[prost(string, tag = "1")]
    pub token: String,
}

/// Change the secret of an entity.
///
/// Entities changing their own secret may authenticate with `current` instead of a token.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ChangeSecretRequest {
    #[prost(string, tag = "1")]
    pub id: String,

    #[prost(string, tag = "2")]
    pub current: String,

    #[prost(string, tag = "3")]
    pub secret: String,
}

/// Request carrying (part of) an entity.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EntityRequest {
    #[prost(message, optional, tag = "1")]
    pub entity: Option<Entity>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EntityReply {
    #[prost(message, repeated, tag = "1")]
    pub entities: Vec<Entity>,
}

/// Request carrying (part of) a group.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupRequest {
    #[prost(message, optional, tag = "1")]
    pub group: Option<Group>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupReply {
    #[prost(message, repeated, tag = "1")]
    pub groups: Vec<Group>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SearchRequest {
    #[prost(string, tag = "1")]
    pub expression: String,
}

/// Effective or direct memberships of an entity.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupsRequest {
    #[prost(string, tag = "1")]
    pub id: String,

    #[prost(bool, tag = "2")]
    pub indirect: bool,
}

/// Add, remove or list the public keys of an entity.
#[derive(Clone, PartialEq, prost::Message)]
pub struct KeysRequest {
    #[prost(string, tag = "1")]
    pub id: String,

    /// One of `ADD`, `DEL` or `READ`.
    #[prost(string, tag = "2")]
    pub action: String,

    #[prost(string, tag = "3")]
    pub key_type: String,

    #[prost(string, tag = "4")]
    pub key: String,
}

/// Read or change untyped metadata of an entity or group.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MetaRequest {
    /// Entity ID or group name.
    #[prost(string, tag = "1")]
    pub target: String,

    /// One of `READ`, `UPSERT`, `CLEARFUZZY` or `CLEAREXACT`.
    #[prost(string, tag = "2")]
    pub action: String,

    #[prost(string, tag = "3")]
    pub key: String,

    #[prost(string, tag = "4")]
    pub value: String,
}

/// Values returned by key and metadata requests.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ListReply {
    #[prost(string, repeated, tag = "1")]
    pub values: Vec<String>,
}

/// Structured key/values metadata request for an entity or group.
#[derive(Clone, PartialEq, prost::Message)]
pub struct KvRequest {
    /// Entity ID or group name.
    #[prost(string, tag = "1")]
    pub target: String,

    /// Key to read or delete, `*` reads all keys.
    #[prost(string, tag = "2")]
    pub key: String,

    /// Record to add or replace.
    #[prost(message, optional, tag = "3")]
    pub record: Option<KvData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct KvReply {
    #[prost(message, repeated, tag = "1")]
    pub records: Vec<KvData>,
}

/// Change an expansion rule of a group.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RuleRequest {
    #[prost(string, tag = "1")]
    pub group: String,

    #[prost(string, tag = "2")]
    pub target: String,

    /// One of `INCLUDE`, `EXCLUDE` or `DROP`.
    #[prost(string, tag = "3")]
    pub mode: String,
}

/// Add or remove the direct membership of an entity to a group.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MemberRequest {
    #[prost(string, tag = "1")]
    pub group: String,

    #[prost(string, tag = "2")]
    pub entity: String,
}

/// Grant or revoke a capability to an entity or group.
///
/// Exactly one of `entity` or `group` must be set.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CapabilityRequest {
    #[prost(string, optional, tag = "1")]
    pub entity: Option<String>,

    #[prost(string, optional, tag = "2")]
    pub group: Option<String>,

    #[prost(string, tag = "3")]
    pub capability: String,

    /// One of `ADD` or `DROP`.
    #[prost(string, tag = "4")]
    pub action: String,
}

/// Health of an individual subsystem.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SubsystemStatus {
    #[prost(bool, tag = "1")]
    pub ok: bool,

    #[prost(string, tag = "2")]
    pub name: String,

    #[prost(string, tag = "3")]
    pub fault_message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StatusReply {
    #[prost(bool, tag = "1")]
    pub healthy: bool,

    #[prost(string, tag = "2")]
    pub first_failure: String,

    #[prost(message, repeated, tag = "3")]
    pub subsystems: Vec<SubsystemStatus>,
}

impl From<netauth_health::SystemStatus> for StatusReply {
    fn from(status: netauth_health::SystemStatus) -> Self {
        let subsystems = status
            .checks
            .into_iter()
            .map(|check| SubsystemStatus {
                ok: check.ok,
                name: check.name,
                fault_message: check.fault.unwrap_or_default(),
            })
            .collect();
        StatusReply {
            healthy: status.healthy,
            first_failure: status.first_failure.unwrap_or_default(),
            subsystems,
        }
    }
}
