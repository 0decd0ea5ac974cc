//! Volatile in-memory storage backend.
//!
//! All data is lost when the process exits.
//! Useful for tests, development and experimentation.
use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use serde_json::Value as Json;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_events::EventBus;

use crate::EventEmitter;
use crate::Kv;
use crate::KvBackend;
use crate::KvCapability;
use crate::KvFactory;
use crate::KvFactoryArgs;

const CAPABILITIES: &[KvCapability] = &[KvCapability::Mutable, KvCapability::EmitsEvents];

/// Store records in a process local map.
#[derive(Default)]
pub struct MemoryKv {
    data: RwLock<HashMap<String, Vec<u8>>>,
    emitter: EventEmitter,
}

#[async_trait::async_trait]
impl KvBackend for MemoryKv {
    fn capabilities(&self) -> &'static [KvCapability] {
        CAPABILITIES
    }

    async fn close(&self, _: &Context) -> Result<()> {
        Ok(())
    }

    async fn del(&self, context: &Context, key: &str) -> Result<()> {
        let removed = self
            .data
            .write()
            .expect("MemoryKv data lock poisoned")
            .remove(key);
        if removed.is_some() {
            self.emitter.emit(context, key, true).await;
        }
        Ok(())
    }

    async fn get(&self, _: &Context, key: &str) -> Result<Vec<u8>> {
        let data = self.data.read().expect("MemoryKv data lock poisoned");
        match data.get(key) {
            None => anyhow::bail!(Error::NoValue(key.to_string())),
            Some(value) => Ok(value.clone()),
        }
    }

    async fn keys(&self, _: &Context, pattern: &glob::Pattern) -> Result<Vec<String>> {
        let data = self.data.read().expect("MemoryKv data lock poisoned");
        let mut keys: Vec<String> = data
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn put(&self, context: &Context, key: &str, value: Vec<u8>) -> Result<()> {
        self.data
            .write()
            .expect("MemoryKv data lock poisoned")
            .insert(key.to_string(), value);
        self.emitter.emit(context, key, false).await;
        Ok(())
    }

    fn set_events(&self, events: EventBus) {
        self.emitter.install(events)
    }
}

/// Initialise in-memory storage backends.
pub struct MemoryFactory;

#[async_trait::async_trait]
impl KvFactory for MemoryFactory {
    fn conf_check(&self, _: &Context, _: &Json) -> Result<()> {
        Ok(())
    }

    async fn kv<'a>(&self, args: KvFactoryArgs<'a>) -> Result<Kv> {
        slog::warn!(
            args.context.logger,
            "Using in-memory storage means data will be lost once the process terminates"
        );
        Ok(Kv::from(MemoryKv::default()))
    }
}
