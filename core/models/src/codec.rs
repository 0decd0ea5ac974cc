//! Binary wire format for entities and groups.
//!
//! Records are encoded with protocol buffers so the field numbering declared on the
//! model types keeps stored data readable across versions.
use anyhow::Context;
use anyhow::Result;
use prost::Message;

use netauth_errors::Error;

use crate::Entity;
use crate::Group;

/// Encode an entity into its binary wire form.
pub fn encode_entity(entity: &Entity) -> Vec<u8> {
    entity.encode_to_vec()
}

/// Decode an entity from its binary wire form.
pub fn decode_entity(data: &[u8]) -> Result<Entity> {
    Entity::decode(data).context(Error::internal("unable to decode entity record"))
}

/// Encode a group into its binary wire form.
pub fn encode_group(group: &Group) -> Vec<u8> {
    group.encode_to_vec()
}

/// Decode a group from its binary wire form.
pub fn decode_group(data: &[u8]) -> Result<Group> {
    Group::decode(data).context(Error::internal("unable to decode group record"))
}

/// Merge `request` into `working` the way protocol buffers merge messages.
///
/// Set scalar fields in `request` overwrite `working`, repeated fields are appended
/// and nested messages are merged recursively.
pub fn merge_entity(working: &mut Entity, request: &Entity) -> Result<()> {
    let data = request.encode_to_vec();
    working
        .merge(data.as_slice())
        .context(Error::internal("unable to merge entity records"))
}

/// Merge `request` into `working` the way protocol buffers merge messages.
pub fn merge_group(working: &mut Group, request: &Group) -> Result<()> {
    let data = request.encode_to_vec();
    working
        .merge(data.as_slice())
        .context(Error::internal("unable to merge group records"))
}
