//! Tree plugin locking out entities after repeated authentication failures.
//!
//! Every authentication attempt counts as a failure until the post-authentication
//! action confirms it succeeded.
//! Once an entity reaches the threshold, further attempts see the entity as locked.
//! The lock only applies to authentication attempts and is never stored.
//!
//! Administrators clear the counter of an entity by setting the `fail2lock`
//! untyped metadata key to `RESET`; the key is removed again before the entity is saved.
use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

use netauth_context::Context;
use netauth_models::Entity;
use netauth_models::UntypedEntry;
use netauth_plugin::Plugin;

/// Untyped metadata key used to control the plugin.
pub const CONTROL_KEY: &str = "fail2lock";

/// Value of [`CONTROL_KEY`] that clears the failure counter.
pub const RESET_VALUE: &str = "RESET";

/// Default number of failed attempts before lock out.
pub const DEFAULT_THRESHOLD: u32 = 5;

/// Count authentication failures per entity, in memory.
pub struct Fail2Lock {
    failures: Mutex<HashMap<String, u32>>,
    threshold: u32,
}

impl Fail2Lock {
    pub fn new(threshold: u32) -> Fail2Lock {
        Fail2Lock {
            failures: Mutex::new(HashMap::new()),
            threshold,
        }
    }

    /// Current number of failures recorded for an entity.
    pub fn failures(&self, id: &str) -> u32 {
        let failures = self.failures.lock().expect("fail2lock counters lock poisoned");
        failures.get(id).copied().unwrap_or(0)
    }

    fn reset(&self, id: &str) {
        let mut failures = self.failures.lock().expect("fail2lock counters lock poisoned");
        failures.remove(id);
    }
}

impl Default for Fail2Lock {
    fn default() -> Self {
        Fail2Lock::new(DEFAULT_THRESHOLD)
    }
}

fn is_control(raw: &str) -> bool {
    match UntypedEntry::parse(raw) {
        Ok(entry) => entry.key == CONTROL_KEY,
        Err(_) => false,
    }
}

#[async_trait::async_trait]
impl Plugin for Fail2Lock {
    async fn pre_auth_check(&self, context: &Context, mut entity: Entity, _: Entity) -> Result<Entity> {
        let attempts = {
            let mut failures = self.failures.lock().expect("fail2lock counters lock poisoned");
            let attempts = failures.entry(entity.id.clone()).or_insert(0);
            let previous = *attempts;
            *attempts = attempts.saturating_add(1);
            previous
        };
        if attempts >= self.threshold {
            slog::warn!(
                context.logger, "Too many failed authentication attempts, entity locked out";
                "entity" => &entity.id,
                "failures" => attempts,
            );
            entity.meta_mut().locked = Some(true);
        }
        Ok(entity)
    }

    async fn post_auth_check(&self, _: &Context, entity: Entity, _: Entity) -> Result<Entity> {
        self.reset(&entity.id);
        Ok(entity)
    }

    async fn entity_update(&self, context: &Context, mut entity: Entity, _: Entity) -> Result<Entity> {
        let meta = match entity.meta.as_mut() {
            None => return Ok(entity),
            Some(meta) => meta,
        };
        let reset = meta.untyped_meta.iter().any(|raw| match UntypedEntry::parse(raw) {
            Ok(entry) => entry.key == CONTROL_KEY && entry.value.eq_ignore_ascii_case(RESET_VALUE),
            Err(_) => false,
        });
        meta.untyped_meta.retain(|raw| !is_control(raw));
        if reset {
            slog::info!(context.logger, "Failed authentication counter reset"; "entity" => &entity.id);
            self.reset(&entity.id);
        }
        Ok(entity)
    }
}
