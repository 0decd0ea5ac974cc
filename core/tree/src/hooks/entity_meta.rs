//! Entity hooks editing metadata.
//!
//! All these hooks expect the working entity metadata to exist (`ensure-entity-meta`).
use std::sync::Arc;

use anyhow::Result;

use netauth_models::codec;
use netauth_models::untyped;
use netauth_models::Entity;
use netauth_models::EntityMeta;

use crate::hook::HookRegistryBuilder;
use crate::hook::PureEntityHook;

type Transform = fn(&mut Entity, &Entity) -> Result<()>;

const HOOKS: &[(&str, u8, Transform)] = &[
    ("ensure-entity-meta", 25, ensure_entity_meta),
    ("set-entity-capability", 50, set_entity_capability),
    ("remove-entity-capability", 50, remove_entity_capability),
    ("add-entity-key", 50, add_entity_key),
    ("del-entity-key", 50, del_entity_key),
    ("merge-entity-meta", 50, merge_entity_meta),
    ("add-untyped-metadata", 50, add_untyped_metadata),
    ("del-untyped-metadata-fuzzy", 50, del_untyped_metadata_fuzzy),
    ("del-untyped-metadata-exact", 50, del_untyped_metadata_exact),
    ("add-direct-group", 50, add_direct_group),
    ("del-direct-group", 50, del_direct_group),
    ("kv-add", 50, kv_add),
    ("kv-del", 50, kv_del),
    ("kv-replace", 50, kv_replace),
];

pub fn register(builder: &mut HookRegistryBuilder) -> Result<()> {
    for (name, priority, transform) in HOOKS {
        let (name, priority, transform) = (*name, *priority, *transform);
        builder.entity(name, move |_| {
            Ok(Arc::new(PureEntityHook::new(name, priority, transform)))
        })?;
    }
    Ok(())
}

/// Metadata of the request, or empty metadata when the request has none.
fn request_meta(request: &Entity) -> EntityMeta {
    request.meta.clone().unwrap_or_default()
}

fn ensure_entity_meta(working: &mut Entity, _: &Entity) -> Result<()> {
    working.meta_mut();
    Ok(())
}

fn set_entity_capability(working: &mut Entity, request: &Entity) -> Result<()> {
    let requested = request_meta(request).capabilities;
    super::add_capabilities(&mut working.meta_mut().capabilities, &requested)
}

fn remove_entity_capability(working: &mut Entity, request: &Entity) -> Result<()> {
    let requested = request_meta(request).capabilities;
    super::remove_capabilities(&mut working.meta_mut().capabilities, &requested)
}

fn add_entity_key(working: &mut Entity, request: &Entity) -> Result<()> {
    let keys = &mut working.meta_mut().keys;
    for key in request_meta(request).keys {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(())
}

/// Material portion of a `TYPE:material` key.
fn key_material(key: &str) -> &str {
    match key.split_once(':') {
        Some((_, material)) => material,
        None => key,
    }
}

fn del_entity_key(working: &mut Entity, request: &Entity) -> Result<()> {
    let requested = request_meta(request).keys;
    working.meta_mut().keys.retain(|key| {
        let material = key_material(key);
        !requested
            .iter()
            .any(|request| material.contains(key_material(request)))
    });
    Ok(())
}

fn merge_entity_meta(working: &mut Entity, request: &Entity) -> Result<()> {
    // Lists with dedicated chains are never merged.
    let mut meta = request_meta(request);
    meta.capabilities.clear();
    meta.groups.clear();
    meta.keys.clear();
    meta.untyped_meta.clear();
    meta.kv.clear();
    let update = Entity {
        meta: Some(meta),
        ..Default::default()
    };
    codec::merge_entity(working, &update)
}

fn add_untyped_metadata(working: &mut Entity, request: &Entity) -> Result<()> {
    let list = &mut working.meta_mut().untyped_meta;
    for raw in request_meta(request).untyped_meta {
        untyped::upsert(list, &raw)?;
    }
    Ok(())
}

fn del_untyped_metadata_fuzzy(working: &mut Entity, request: &Entity) -> Result<()> {
    let list = &mut working.meta_mut().untyped_meta;
    for raw in request_meta(request).untyped_meta {
        untyped::clear_fuzzy(list, &raw)?;
    }
    Ok(())
}

fn del_untyped_metadata_exact(working: &mut Entity, request: &Entity) -> Result<()> {
    let list = &mut working.meta_mut().untyped_meta;
    for raw in request_meta(request).untyped_meta {
        untyped::clear_exact(list, &raw)?;
    }
    Ok(())
}

fn add_direct_group(working: &mut Entity, request: &Entity) -> Result<()> {
    let groups = &mut working.meta_mut().groups;
    for group in request_meta(request).groups {
        if !groups.contains(&group) {
            groups.push(group);
        }
    }
    Ok(())
}

fn del_direct_group(working: &mut Entity, request: &Entity) -> Result<()> {
    let requested = request_meta(request).groups;
    working
        .meta_mut()
        .groups
        .retain(|group| !requested.contains(group));
    Ok(())
}

fn kv_add(working: &mut Entity, request: &Entity) -> Result<()> {
    super::kv_add(&mut working.meta_mut().kv, &request_meta(request).kv)
}

fn kv_del(working: &mut Entity, request: &Entity) -> Result<()> {
    super::kv_del(&mut working.meta_mut().kv, &request_meta(request).kv)
}

fn kv_replace(working: &mut Entity, request: &Entity) -> Result<()> {
    super::kv_replace(&mut working.meta_mut().kv, &request_meta(request).kv)
}
