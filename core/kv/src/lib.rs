//! Byte oriented key/value storage for NetAuth tree records.
//!
//! The tree stores serialised entities and groups as opaque values under the keys
//! described in the [`keys`] module.
//! Storage implementations are provided by [`KvBackend`]s, selected at process start
//! by name through their [`KvFactory`].
//!
//! ## Events
//!
//! Backends advertising [`KvCapability::EmitsEvents`] fire an [`Event`](netauth_events::Event)
//! on the [`EventBus`] installed with [`Kv::set_events`] for every change:
//!
//! - [`Kv::put`] emits `EntityUpdate` or `GroupUpdate` (backends can't tell creates from updates).
//! - [`Kv::del`] emits `EntityDestroy` or `GroupDestroy` when a record was removed.
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value as Json;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_events::EventBus;

mod emitter;
pub mod keys;
mod memory;

#[cfg(test)]
mod tests;

pub use self::emitter::EventEmitter;
pub use self::memory::MemoryFactory;
pub use self::memory::MemoryKv;

/// Features a [`KvBackend`] may support.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KvCapability {
    /// The backend accepts writes.
    Mutable,

    /// The backend fires events on the installed [`EventBus`] for every change.
    EmitsEvents,
}

/// Access byte values stored under path-shaped keys.
#[derive(Clone)]
pub struct Kv {
    inner: Arc<dyn KvBackend>,
}

impl Kv {
    /// List the features supported by the backend.
    pub fn capabilities(&self) -> &'static [KvCapability] {
        self.inner.capabilities()
    }

    /// Release resources held by the backend.
    pub async fn close(&self, context: &Context) -> Result<()> {
        self.inner.close(context).await
    }

    /// Remove the value stored at `key`, if any.
    pub async fn del(&self, context: &Context, key: &str) -> Result<()> {
        ensure_active(context)?;
        self.ensure_mutable()?;
        self.inner.del(context, key).await
    }

    /// Fetch the value stored at `key`.
    ///
    /// Missing keys fail with [`Error::NoValue`].
    pub async fn get(&self, context: &Context, key: &str) -> Result<Vec<u8>> {
        ensure_active(context)?;
        self.inner.get(context, key).await
    }

    /// Check if the backend supports a feature.
    pub fn has_capability(&self, capability: KvCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Verify the backend is able to serve requests.
    pub async fn health(&self, context: &Context) -> Result<()> {
        self.inner.health(context).await
    }

    /// List all keys matching a shell glob pattern.
    pub async fn keys(&self, context: &Context, pattern: &str) -> Result<Vec<String>> {
        ensure_active(context)?;
        let pattern = glob::Pattern::new(pattern)
            .map_err(|error| Error::MalformedRequest(format!("invalid key glob: {}", error)))?;
        self.inner.keys(context, &pattern).await
    }

    /// Store `value` at `key`, replacing any previous value.
    pub async fn put(&self, context: &Context, key: &str, value: Vec<u8>) -> Result<()> {
        ensure_active(context)?;
        self.ensure_mutable()?;
        self.inner.put(context, key, value).await
    }

    /// Install the [`EventBus`] changes are reported to.
    ///
    /// Must be called before any write for events to be emitted.
    pub fn set_events(&self, events: EventBus) {
        self.inner.set_events(events)
    }

    fn ensure_mutable(&self) -> Result<()> {
        if !self.has_capability(KvCapability::Mutable) {
            anyhow::bail!(Error::ReadOnly);
        }
        Ok(())
    }
}

impl<T> From<T> for Kv
where
    T: KvBackend + 'static,
{
    fn from(value: T) -> Self {
        Kv {
            inner: Arc::new(value),
        }
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Kv {
    /// Initialise an in-memory backend for unit tests.
    pub fn fixture() -> Self {
        Kv::from(MemoryKv::default())
    }
}

/// Operations implemented by storage backends.
#[async_trait::async_trait]
pub trait KvBackend: Send + Sync {
    /// List the features supported by the backend.
    fn capabilities(&self) -> &'static [KvCapability];

    /// Release resources held by the backend.
    async fn close(&self, context: &Context) -> Result<()>;

    /// Remove the value stored at `key`; missing keys are not an error.
    async fn del(&self, context: &Context, key: &str) -> Result<()>;

    /// Fetch the value stored at `key` or fail with [`Error::NoValue`].
    async fn get(&self, context: &Context, key: &str) -> Result<Vec<u8>>;

    /// Verify the backend is able to serve requests.
    ///
    /// By default a backend that can list its keys is healthy.
    async fn health(&self, context: &Context) -> Result<()> {
        let pattern = glob::Pattern::new("*")?;
        self.keys(context, &pattern).await?;
        Ok(())
    }

    /// List all keys matching the pattern.
    async fn keys(&self, context: &Context, pattern: &glob::Pattern) -> Result<Vec<String>>;

    /// Store `value` at `key`.
    async fn put(&self, context: &Context, key: &str, value: Vec<u8>) -> Result<()>;

    /// Install the [`EventBus`] changes are reported to.
    fn set_events(&self, events: EventBus);
}

/// Initialisation logic for a [`KvBackend`].
#[async_trait::async_trait]
pub trait KvFactory: Send + Sync {
    /// Validate the user provided configuration for the backend.
    fn conf_check(&self, context: &Context, conf: &Json) -> Result<()>;

    /// Instantiate a [`Kv`] object to access stored records.
    async fn kv<'a>(&self, args: KvFactoryArgs<'a>) -> Result<Kv>;
}

/// Arguments passed to the [`KvFactory`] initialisation method.
pub struct KvFactoryArgs<'a> {
    /// The configuration block for the backend to initialise.
    pub conf: &'a Json,

    /// Container for operation scoped values.
    pub context: &'a Context,
}

/// Fail with [`Error::Cancelled`] if the operation was abandoned.
fn ensure_active(context: &Context) -> Result<()> {
    if context.is_cancelled() {
        anyhow::bail!(Error::Cancelled);
    }
    Ok(())
}
