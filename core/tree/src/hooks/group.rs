//! Group hooks for storage, identity and metadata.
use std::sync::Arc;

use anyhow::Result;

use netauth_context::Context;
use netauth_db::Db;
use netauth_errors::Error;
use netauth_models::codec;
use netauth_models::untyped;
use netauth_models::Group;

use crate::hook::GroupHook;
use crate::hook::HookRegistryBuilder;
use crate::hook::PureGroupHook;

type Transform = fn(&mut Group, &Group) -> Result<()>;

const PURE_HOOKS: &[(&str, u8, Transform)] = &[
    ("set-group-name", 10, set_group_name),
    ("set-group-displayname", 10, set_group_displayname),
    ("merge-group-meta", 50, merge_group_meta),
    ("set-group-capability", 50, set_group_capability),
    ("remove-group-capability", 50, remove_group_capability),
    ("add-untyped-metadata", 50, add_untyped_metadata),
    ("del-untyped-metadata-fuzzy", 50, del_untyped_metadata_fuzzy),
    ("del-untyped-metadata-exact", 50, del_untyped_metadata_exact),
    ("kv-add", 50, kv_add),
    ("kv-del", 50, kv_del),
    ("kv-replace", 50, kv_replace),
];

pub fn register(builder: &mut HookRegistryBuilder) -> Result<()> {
    for (name, priority, transform) in PURE_HOOKS {
        let (name, priority, transform) = (*name, *priority, *transform);
        builder.group(name, move |_| {
            Ok(Arc::new(PureGroupHook::new(name, priority, transform)))
        })?;
    }

    builder.group("load-group", |refs| {
        Ok(Arc::new(LoadGroup {
            db: refs.db.clone(),
        }))
    })?;
    builder.group("fail-on-existing-group", |refs| {
        Ok(Arc::new(FailOnExistingGroup {
            db: refs.db.clone(),
        }))
    })?;
    builder.group("set-group-number", |refs| {
        Ok(Arc::new(SetGroupNumber {
            db: refs.db.clone(),
        }))
    })?;
    builder.group("set-managing-group", |refs| {
        Ok(Arc::new(SetManagingGroup {
            db: refs.db.clone(),
        }))
    })?;
    builder.group("save-group", |refs| {
        Ok(Arc::new(SaveGroup {
            db: refs.db.clone(),
        }))
    })?;
    builder.group("destroy-group", |refs| {
        Ok(Arc::new(DestroyGroup {
            db: refs.db.clone(),
        }))
    })?;
    Ok(())
}

/// Load the requested group into the working value.
pub struct LoadGroup {
    db: Db,
}

#[async_trait::async_trait]
impl GroupHook for LoadGroup {
    fn name(&self) -> &str {
        "load-group"
    }

    fn priority(&self) -> u8 {
        0
    }

    async fn run(&self, context: &Context, working: &mut Group, request: &Group) -> Result<()> {
        *working = self.db.load_group(context, &request.name).await?;
        Ok(())
    }
}

/// Succeed only if the requested group does not exist.
pub struct FailOnExistingGroup {
    db: Db,
}

#[async_trait::async_trait]
impl GroupHook for FailOnExistingGroup {
    fn name(&self) -> &str {
        "fail-on-existing-group"
    }

    fn priority(&self) -> u8 {
        0
    }

    async fn run(&self, context: &Context, _: &mut Group, request: &Group) -> Result<()> {
        match self.db.load_group(context, &request.name).await {
            Ok(_) => anyhow::bail!(Error::DuplicateGroupName(request.name.clone())),
            Err(error) if Error::UnknownGroup(String::new()).is_kind(&error) => Ok(()),
            Err(error) => Err(error),
        }
    }
}

/// Assign the requested number, or the next free one for numbers below 1.
pub struct SetGroupNumber {
    db: Db,
}

#[async_trait::async_trait]
impl GroupHook for SetGroupNumber {
    fn name(&self) -> &str {
        "set-group-number"
    }

    fn priority(&self) -> u8 {
        5
    }

    async fn run(&self, context: &Context, working: &mut Group, request: &Group) -> Result<()> {
        if request.number < 1 {
            working.number = self.db.next_group_number(context).await?;
            return Ok(());
        }
        let groups = self.db.all_groups(context).await?;
        if groups.iter().any(|group| group.number == request.number) {
            anyhow::bail!(Error::DuplicateNumber(request.number));
        }
        working.number = request.number;
        Ok(())
    }
}

/// Set the group whose members manage this group.
///
/// Requests without a managing group leave the working value untouched.
/// An empty name makes the group unmanaged and the group's own name makes it
/// self-managed, any other group must exist.
pub struct SetManagingGroup {
    db: Db,
}

#[async_trait::async_trait]
impl GroupHook for SetManagingGroup {
    fn name(&self) -> &str {
        "set-managing-group"
    }

    fn priority(&self) -> u8 {
        10
    }

    async fn run(&self, context: &Context, working: &mut Group, request: &Group) -> Result<()> {
        let managed_by = match &request.managed_by {
            None => return Ok(()),
            Some(managed_by) => managed_by,
        };
        if managed_by.is_empty() {
            working.managed_by = None;
            return Ok(());
        }
        if *managed_by != request.name {
            self.db.load_group(context, managed_by).await?;
        }
        working.managed_by = Some(managed_by.clone());
        Ok(())
    }
}

pub struct SaveGroup {
    db: Db,
}

#[async_trait::async_trait]
impl GroupHook for SaveGroup {
    fn name(&self) -> &str {
        "save-group"
    }

    fn priority(&self) -> u8 {
        99
    }

    async fn run(&self, context: &Context, working: &mut Group, _: &Group) -> Result<()> {
        self.db.save_group(context, working).await
    }
}

pub struct DestroyGroup {
    db: Db,
}

#[async_trait::async_trait]
impl GroupHook for DestroyGroup {
    fn name(&self) -> &str {
        "destroy-group"
    }

    fn priority(&self) -> u8 {
        99
    }

    async fn run(&self, context: &Context, working: &mut Group, request: &Group) -> Result<()> {
        if working.name.is_empty() {
            working.name = request.name.clone();
        }
        self.db.delete_group(context, &working.name).await
    }
}

fn set_group_name(working: &mut Group, request: &Group) -> Result<()> {
    if request.name.is_empty() {
        anyhow::bail!(Error::MalformedRequest("group name is required".into()));
    }
    working.name = request.name.clone();
    Ok(())
}

fn set_group_displayname(working: &mut Group, request: &Group) -> Result<()> {
    working.display_name = request.display_name.clone();
    Ok(())
}

fn merge_group_meta(working: &mut Group, request: &Group) -> Result<()> {
    // Identity and lists with dedicated chains are never merged.
    let update = Group {
        display_name: request.display_name.clone(),
        ..Default::default()
    };
    codec::merge_group(working, &update)
}

fn set_group_capability(working: &mut Group, request: &Group) -> Result<()> {
    super::add_capabilities(&mut working.capabilities, &request.capabilities)
}

fn remove_group_capability(working: &mut Group, request: &Group) -> Result<()> {
    super::remove_capabilities(&mut working.capabilities, &request.capabilities)
}

fn add_untyped_metadata(working: &mut Group, request: &Group) -> Result<()> {
    for raw in &request.untyped_meta {
        untyped::upsert(&mut working.untyped_meta, raw)?;
    }
    Ok(())
}

fn del_untyped_metadata_fuzzy(working: &mut Group, request: &Group) -> Result<()> {
    for raw in &request.untyped_meta {
        untyped::clear_fuzzy(&mut working.untyped_meta, raw)?;
    }
    Ok(())
}

fn del_untyped_metadata_exact(working: &mut Group, request: &Group) -> Result<()> {
    for raw in &request.untyped_meta {
        untyped::clear_exact(&mut working.untyped_meta, raw)?;
    }
    Ok(())
}

fn kv_add(working: &mut Group, request: &Group) -> Result<()> {
    super::kv_add(&mut working.kv, &request.kv)
}

fn kv_del(working: &mut Group, request: &Group) -> Result<()> {
    super::kv_del(&mut working.kv, &request.kv)
}

fn kv_replace(working: &mut Group, request: &Group) -> Result<()> {
    super::kv_replace(&mut working.kv, &request.kv)
}

#[cfg(test)]
mod tests {
    use netauth_context::Context;
    use netauth_errors::Error;
    use netauth_models::Group;

    use super::*;
    use crate::tests::refs;

    #[tokio::test]
    async fn managing_group_must_exist() {
        let context = Context::fixture();
        let refs = refs(&context).await;
        let hook = SetManagingGroup {
            db: refs.db.clone(),
        };

        let mut request = Group::with_name("dev");
        request.managed_by = Some("admins".into());
        let error = hook
            .run(&context, &mut Group::default(), &request)
            .await
            .unwrap_err();
        assert_eq!(Error::find(&error), Some(&Error::UnknownGroup("admins".into())));

        refs.db
            .save_group(&context, &Group::with_name("admins"))
            .await
            .unwrap();
        let mut working = Group::with_name("dev");
        hook.run(&context, &mut working, &request).await.unwrap();
        assert_eq!(working.managed_by.as_deref(), Some("admins"));
    }

    #[tokio::test]
    async fn managing_group_self_and_empty() {
        let context = Context::fixture();
        let refs = refs(&context).await;
        let hook = SetManagingGroup {
            db: refs.db.clone(),
        };

        let mut request = Group::with_name("dev");
        request.managed_by = Some("dev".into());
        let mut working = Group::with_name("dev");
        hook.run(&context, &mut working, &request).await.unwrap();
        assert_eq!(working.managed_by.as_deref(), Some("dev"));

        request.managed_by = None;
        hook.run(&context, &mut working, &request).await.unwrap();
        assert_eq!(working.managed_by.as_deref(), Some("dev"));

        request.managed_by = Some(String::new());
        hook.run(&context, &mut working, &request).await.unwrap();
        assert_eq!(working.managed_by, None);
    }

    #[test]
    fn merge_only_updates_display_name() {
        let mut working = Group::with_name("dev");
        working.number = 4;
        working.expansions.push("INCLUDE:ops".into());
        let mut request = Group::with_name("dev");
        request.display_name = Some("Developers".into());
        request.expansions.push("INCLUDE:admins".into());
        request.number = 9;

        merge_group_meta(&mut working, &request).unwrap();
        assert_eq!(working.display_name.as_deref(), Some("Developers"));
        assert_eq!(working.number, 4);
        assert_eq!(working.expansions, vec!["INCLUDE:ops"]);
    }
}
