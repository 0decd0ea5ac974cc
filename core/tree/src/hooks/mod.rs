//! Hooks provided by the tree for the default chains.
//!
//! Priority bands:
//!
//! - 0-10: loaders.
//! - 11-19: load time integrity checks.
//! - 20-29: pre-processing (plugin pre-action hooks).
//! - 30-49: validation and data shaping.
//! - 50-89: main mutation and post-processing (plugin post-action hooks).
//! - 90-99: serialisation and storage.
use std::sync::Arc;

use anyhow::Result;

use netauth_errors::Error;
use netauth_models::kv;
use netauth_models::Capability;
use netauth_models::KvData;
use netauth_plugin::Action;

use crate::hook::HookRegistryBuilder;

mod entity;
mod entity_meta;
mod expansions;
mod group;
mod plugin;

pub use self::plugin::EntityPluginHook;
pub use self::plugin::GroupPluginHook;

/// Register the constructors of all hooks the default chains need.
pub fn register_defaults(builder: &mut HookRegistryBuilder) -> Result<()> {
    self::entity::register(builder)?;
    self::entity_meta::register(builder)?;
    self::group::register(builder)?;
    self::expansions::register(builder)?;

    for action in Action::ALL {
        let name = action.hook_name();
        if action.is_group() {
            builder.group(&name, move |refs| {
                let hook = GroupPluginHook::new(action, refs.plugins.clone());
                Ok(Arc::new(hook))
            })?;
        } else {
            builder.entity(&name, move |refs| {
                let hook = EntityPluginHook::new(action, refs.plugins.clone());
                Ok(Arc::new(hook))
            })?;
        }
    }
    Ok(())
}

/// Grant requested capabilities not already held.
fn add_capabilities(held: &mut Vec<i32>, requested: &[i32]) -> Result<()> {
    for capability in requested_capabilities(requested)? {
        let value = capability as i32;
        if !held.contains(&value) {
            held.push(value);
        }
    }
    Ok(())
}

/// Revoke requested capabilities.
fn remove_capabilities(held: &mut Vec<i32>, requested: &[i32]) -> Result<()> {
    let requested = requested_capabilities(requested)?;
    held.retain(|value| {
        !requested
            .iter()
            .any(|capability| *capability as i32 == *value)
    });
    Ok(())
}

fn requested_capabilities(requested: &[i32]) -> Result<Vec<Capability>> {
    if requested.is_empty() {
        anyhow::bail!(Error::UnknownCapability(String::new()));
    }
    let mut capabilities = Vec::with_capacity(requested.len());
    for value in requested {
        match Capability::from_wire(*value) {
            Some(capability) => capabilities.push(capability),
            None => anyhow::bail!(Error::UnknownCapability(value.to_string())),
        }
    }
    Ok(capabilities)
}

/// Extract the only KV2 record a request is expected to carry.
fn single_kv_record(requested: &[KvData]) -> Result<&KvData> {
    match requested {
        [record] => Ok(record),
        _ => anyhow::bail!(Error::FailedPrecondition(format!(
            "exactly one key/values record is required, {} given",
            requested.len()
        ))),
    }
}

fn kv_add(records: &mut Vec<KvData>, requested: &[KvData]) -> Result<()> {
    let record = single_kv_record(requested)?;
    kv::add(records, record.clone())?;
    Ok(())
}

fn kv_del(records: &mut Vec<KvData>, requested: &[KvData]) -> Result<()> {
    let record = single_kv_record(requested)?;
    kv::del(records, &record.key)?;
    Ok(())
}

fn kv_replace(records: &mut Vec<KvData>, requested: &[KvData]) -> Result<()> {
    let record = single_kv_record(requested)?;
    kv::replace(records, record.clone())?;
    Ok(())
}
