use anyhow::Result;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_events::Event;
use netauth_events::EventBus;
use netauth_events::EventType;
use netauth_events::EventsFixture;

use crate::Kv;
use crate::KvBackend;
use crate::KvCapability;
use crate::MemoryKv;

#[tokio::test]
async fn put_then_get() {
    let context = Context::fixture();
    let kv = Kv::fixture();
    kv.put(&context, "/entities/alice", b"alice".to_vec())
        .await
        .unwrap();
    let value = kv.get(&context, "/entities/alice").await.unwrap();
    assert_eq!(value, b"alice");
}

#[tokio::test]
async fn get_missing_is_no_value() {
    let context = Context::fixture();
    let kv = Kv::fixture();
    let error = kv.get(&context, "/entities/alice").await.unwrap_err();
    assert_eq!(
        Error::find(&error),
        Some(&Error::NoValue("/entities/alice".into()))
    );
}

#[tokio::test]
async fn del_missing_is_ok() {
    let context = Context::fixture();
    let kv = Kv::fixture();
    kv.del(&context, "/groups/eng").await.unwrap();
}

#[tokio::test]
async fn keys_by_glob() {
    let context = Context::fixture();
    let kv = Kv::fixture();
    for key in ["/entities/bob", "/entities/alice", "/groups/eng"] {
        kv.put(&context, key, Vec::new()).await.unwrap();
    }
    let keys = kv.keys(&context, "/entities/*").await.unwrap();
    assert_eq!(keys, ["/entities/alice", "/entities/bob"]);
    let keys = kv.keys(&context, "/groups/e*").await.unwrap();
    assert_eq!(keys, ["/groups/eng"]);
}

#[tokio::test]
async fn changes_emit_events() {
    let context = Context::fixture();
    let kv = Kv::fixture();
    let bus = EventBus::default();
    let events = EventsFixture::default();
    bus.register("test", events.clone());
    kv.set_events(bus);

    kv.put(&context, "/entities/alice", Vec::new()).await.unwrap();
    kv.del(&context, "/entities/alice").await.unwrap();
    kv.del(&context, "/entities/alice").await.unwrap();
    kv.put(&context, "/groups/eng", Vec::new()).await.unwrap();
    assert_eq!(
        events.drain(),
        [
            Event::new(EventType::EntityUpdate, "alice"),
            Event::new(EventType::EntityDestroy, "alice"),
            Event::new(EventType::GroupUpdate, "eng"),
        ]
    );
}

#[tokio::test]
async fn cancelled_context_is_refused() {
    let context = Context::fixture();
    context.cancel.cancel();
    let kv = Kv::fixture();
    let error = kv
        .put(&context, "/entities/alice", Vec::new())
        .await
        .unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::Cancelled));
}

struct ReadOnlyKv;

#[async_trait::async_trait]
impl KvBackend for ReadOnlyKv {
    fn capabilities(&self) -> &'static [KvCapability] {
        &[]
    }

    async fn close(&self, _: &Context) -> Result<()> {
        Ok(())
    }

    async fn del(&self, _: &Context, _: &str) -> Result<()> {
        panic!("del on read only backend")
    }

    async fn get(&self, _: &Context, key: &str) -> Result<Vec<u8>> {
        anyhow::bail!(Error::NoValue(key.to_string()))
    }

    async fn keys(&self, _: &Context, _: &glob::Pattern) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn put(&self, _: &Context, _: &str, _: Vec<u8>) -> Result<()> {
        panic!("put on read only backend")
    }

    fn set_events(&self, _: EventBus) {}
}

#[tokio::test]
async fn immutable_backend_refuses_writes() {
    let context = Context::fixture();
    let kv = Kv::from(ReadOnlyKv);
    let error = kv
        .put(&context, "/entities/alice", Vec::new())
        .await
        .unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::ReadOnly));
    let error = kv.del(&context, "/entities/alice").await.unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::ReadOnly));
    kv.health(&context).await.unwrap();
}

#[tokio::test]
async fn memory_capabilities() {
    let kv = Kv::from(MemoryKv::default());
    assert!(kv.has_capability(KvCapability::Mutable));
    assert!(kv.has_capability(KvCapability::EmitsEvents));
}
