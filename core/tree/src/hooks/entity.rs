//! Entity hooks dealing with storage, identity and secrets.
use std::sync::Arc;

use anyhow::Result;

use netauth_context::Context;
use netauth_crypto::Crypto;
use netauth_db::Db;
use netauth_errors::Error;
use netauth_models::Entity;

use crate::hook::EntityHook;
use crate::hook::HookRegistryBuilder;
use crate::hook::PureEntityHook;

pub fn register(builder: &mut HookRegistryBuilder) -> Result<()> {
    builder.entity("load-entity", |refs| {
        Ok(Arc::new(LoadEntity {
            db: refs.db.clone(),
        }))
    })?;
    builder.entity("fail-on-existing-entity", |refs| {
        Ok(Arc::new(FailOnExistingEntity {
            db: refs.db.clone(),
        }))
    })?;
    builder.entity("create-entity-if-missing", |refs| {
        Ok(Arc::new(CreateEntityIfMissing {
            db: refs.db.clone(),
        }))
    })?;
    builder.entity("set-entity-number", |refs| {
        Ok(Arc::new(SetEntityNumber {
            db: refs.db.clone(),
        }))
    })?;
    builder.entity("set-entity-id", |_| {
        Ok(Arc::new(PureEntityHook::new("set-entity-id", 10, set_entity_id)))
    })?;
    builder.entity("set-entity-secret", |refs| {
        Ok(Arc::new(SetEntitySecret {
            crypto: refs.crypto.clone(),
        }))
    })?;
    builder.entity("validate-entity-unlocked", |_| {
        let hook = PureEntityHook::new("validate-entity-unlocked", 30, validate_entity_unlocked);
        Ok(Arc::new(hook))
    })?;
    builder.entity("validate-entity-secret", |refs| {
        Ok(Arc::new(ValidateEntitySecret {
            crypto: refs.crypto.clone(),
        }))
    })?;
    builder.entity("lock-entity", |_| {
        Ok(Arc::new(PureEntityHook::new("lock-entity", 40, lock_entity)))
    })?;
    builder.entity("unlock-entity", |_| {
        Ok(Arc::new(PureEntityHook::new("unlock-entity", 50, unlock_entity)))
    })?;
    builder.entity("save-entity", |refs| {
        Ok(Arc::new(SaveEntity {
            db: refs.db.clone(),
        }))
    })?;
    builder.entity("destroy-entity", |refs| {
        Ok(Arc::new(DestroyEntity {
            db: refs.db.clone(),
        }))
    })?;
    Ok(())
}

/// Load the requested entity into the working value.
pub struct LoadEntity {
    db: Db,
}

#[async_trait::async_trait]
impl EntityHook for LoadEntity {
    fn name(&self) -> &str {
        "load-entity"
    }

    fn priority(&self) -> u8 {
        0
    }

    async fn run(&self, context: &Context, working: &mut Entity, request: &Entity) -> Result<()> {
        *working = self.db.load_entity(context, &request.id).await?;
        Ok(())
    }
}

/// Succeed only if the requested entity does not exist.
pub struct FailOnExistingEntity {
    db: Db,
}

#[async_trait::async_trait]
impl EntityHook for FailOnExistingEntity {
    fn name(&self) -> &str {
        "fail-on-existing-entity"
    }

    fn priority(&self) -> u8 {
        0
    }

    async fn run(&self, context: &Context, _: &mut Entity, request: &Entity) -> Result<()> {
        match self.db.load_entity(context, &request.id).await {
            Ok(_) => anyhow::bail!(Error::DuplicateEntityID(request.id.clone())),
            Err(error) if Error::UnknownEntity(String::new()).is_kind(&error) => Ok(()),
            Err(error) => Err(error),
        }
    }
}

/// Load the requested entity or start a new one with the next free number.
pub struct CreateEntityIfMissing {
    db: Db,
}

#[async_trait::async_trait]
impl EntityHook for CreateEntityIfMissing {
    fn name(&self) -> &str {
        "create-entity-if-missing"
    }

    fn priority(&self) -> u8 {
        0
    }

    async fn run(&self, context: &Context, working: &mut Entity, request: &Entity) -> Result<()> {
        match self.db.load_entity(context, &request.id).await {
            Ok(entity) => *working = entity,
            Err(error) if Error::UnknownEntity(String::new()).is_kind(&error) => {
                slog::info!(
                    context.logger, "Creating missing entity";
                    "entity" => &request.id,
                );
                *working = Entity::with_id(&request.id);
                working.number = self.db.next_entity_number(context).await?;
            }
            Err(error) => return Err(error),
        }
        Ok(())
    }
}

/// Assign the requested number, or the next free one for numbers below 1.
pub struct SetEntityNumber {
    db: Db,
}

#[async_trait::async_trait]
impl EntityHook for SetEntityNumber {
    fn name(&self) -> &str {
        "set-entity-number"
    }

    fn priority(&self) -> u8 {
        5
    }

    async fn run(&self, context: &Context, working: &mut Entity, request: &Entity) -> Result<()> {
        if request.number < 1 {
            working.number = self.db.next_entity_number(context).await?;
            return Ok(());
        }
        let entities = self.db.all_entities(context).await?;
        if entities.iter().any(|entity| entity.number == request.number) {
            anyhow::bail!(Error::DuplicateNumber(request.number));
        }
        working.number = request.number;
        Ok(())
    }
}

fn set_entity_id(working: &mut Entity, request: &Entity) -> Result<()> {
    if request.id.is_empty() {
        anyhow::bail!(Error::MalformedRequest("entity ID is required".into()));
    }
    working.id = request.id.clone();
    Ok(())
}

/// Secure the requested secret and store it on the working entity.
pub struct SetEntitySecret {
    crypto: Crypto,
}

#[async_trait::async_trait]
impl EntityHook for SetEntitySecret {
    fn name(&self) -> &str {
        "set-entity-secret"
    }

    fn priority(&self) -> u8 {
        50
    }

    async fn run(&self, context: &Context, working: &mut Entity, request: &Entity) -> Result<()> {
        working.secret = self.crypto.secure_secret(context, &request.secret).await?;
        Ok(())
    }
}

fn validate_entity_unlocked(working: &mut Entity, _: &Entity) -> Result<()> {
    if working.is_locked() {
        anyhow::bail!(Error::EntityLocked(working.id.clone()));
    }
    Ok(())
}

/// Verify the requested secret against the stored one.
pub struct ValidateEntitySecret {
    crypto: Crypto,
}

#[async_trait::async_trait]
impl EntityHook for ValidateEntitySecret {
    fn name(&self) -> &str {
        "validate-entity-secret"
    }

    fn priority(&self) -> u8 {
        40
    }

    async fn run(&self, context: &Context, working: &mut Entity, request: &Entity) -> Result<()> {
        self.crypto
            .verify_secret(context, &request.secret, &working.secret)
            .await
    }
}

fn lock_entity(working: &mut Entity, _: &Entity) -> Result<()> {
    working.meta_mut().locked = Some(true);
    Ok(())
}

fn unlock_entity(working: &mut Entity, _: &Entity) -> Result<()> {
    working.meta_mut().locked = Some(false);
    Ok(())
}

pub struct SaveEntity {
    db: Db,
}

#[async_trait::async_trait]
impl EntityHook for SaveEntity {
    fn name(&self) -> &str {
        "save-entity"
    }

    fn priority(&self) -> u8 {
        99
    }

    async fn run(&self, context: &Context, working: &mut Entity, _: &Entity) -> Result<()> {
        self.db.save_entity(context, working).await
    }
}

pub struct DestroyEntity {
    db: Db,
}

#[async_trait::async_trait]
impl EntityHook for DestroyEntity {
    fn name(&self) -> &str {
        "destroy-entity"
    }

    fn priority(&self) -> u8 {
        99
    }

    async fn run(&self, context: &Context, working: &mut Entity, request: &Entity) -> Result<()> {
        if working.id.is_empty() {
            working.id = request.id.clone();
        }
        self.db.delete_entity(context, &working.id).await
    }
}
