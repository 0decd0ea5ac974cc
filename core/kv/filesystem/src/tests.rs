use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_events::Event;
use netauth_events::EventBus;
use netauth_events::EventType;
use netauth_events::EventsFixture;
use netauth_kv::Kv;

use crate::FilesystemKv;
use crate::DIR_MODE;

fn open(context: &Context, home: &tempfile::TempDir) -> (FilesystemKv, EventsFixture) {
    let backend = FilesystemKv::open(context, home.path()).unwrap();
    let bus = EventBus::default();
    let events = EventsFixture::default();
    bus.register("test", events.clone());
    netauth_kv::KvBackend::set_events(&backend, bus);
    (backend, events)
}

#[tokio::test]
async fn records_stored_as_files() {
    let context = Context::fixture();
    let home = tempfile::tempdir().unwrap();
    let (backend, _) = open(&context, &home);
    let kv = Kv::from(backend);

    kv.put(&context, "/entities/alice", b"alice".to_vec())
        .await
        .unwrap();
    let on_disk = std::fs::read(home.path().join("entities/alice.dat")).unwrap();
    assert_eq!(on_disk, b"alice");
    assert_eq!(kv.get(&context, "/entities/alice").await.unwrap(), b"alice");

    kv.put(&context, "/entities/alice", b"updated".to_vec())
        .await
        .unwrap();
    assert_eq!(kv.get(&context, "/entities/alice").await.unwrap(), b"updated");
}

#[tokio::test]
async fn directories_have_required_mode() {
    let context = Context::fixture();
    let home = tempfile::tempdir().unwrap();
    let (backend, _) = open(&context, &home);
    let kv = Kv::from(backend);
    for dir in ["entities", "groups"] {
        let meta = std::fs::metadata(home.path().join(dir)).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, DIR_MODE);
    }
    kv.health(&context).await.unwrap();

    let groups = home.path().join("groups");
    std::fs::set_permissions(groups, std::fs::Permissions::from_mode(0o777)).unwrap();
    let error = kv.health(&context).await.unwrap_err();
    assert!(matches!(
        Error::find(&error),
        Some(Error::FailedPrecondition(_))
    ));
}

#[tokio::test]
async fn home_directory_has_required_mode() {
    let context = Context::fixture();
    let home = tempfile::tempdir().unwrap();
    std::fs::set_permissions(home.path(), std::fs::Permissions::from_mode(0o700)).unwrap();
    let (backend, _) = open(&context, &home);
    let kv = Kv::from(backend);
    let meta = std::fs::metadata(home.path()).unwrap();
    assert_eq!(meta.permissions().mode() & 0o777, DIR_MODE);
    kv.health(&context).await.unwrap();

    std::fs::set_permissions(home.path(), std::fs::Permissions::from_mode(0o777)).unwrap();
    let error = kv.health(&context).await.unwrap_err();
    match Error::find(&error) {
        Some(Error::FailedPrecondition(reason)) => assert!(reason.contains("has mode 777")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn missing_records() {
    let context = Context::fixture();
    let home = tempfile::tempdir().unwrap();
    let (backend, events) = open(&context, &home);
    let kv = Kv::from(backend);
    let error = kv.get(&context, "/groups/eng").await.unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::NoValue("/groups/eng".into())));
    kv.del(&context, "/groups/eng").await.unwrap();
    assert!(events.drain().is_empty());
}

#[tokio::test]
async fn list_keys_and_emit_events() {
    let context = Context::fixture();
    let home = tempfile::tempdir().unwrap();
    let (backend, events) = open(&context, &home);
    let kv = Kv::from(backend);
    kv.put(&context, "/groups/eng", Vec::new()).await.unwrap();
    kv.put(&context, "/entities/bob", Vec::new()).await.unwrap();
    kv.put(&context, "/entities/alice", Vec::new()).await.unwrap();
    std::fs::write(home.path().join("entities/notes.txt"), b"ignored").unwrap();

    let keys = kv.keys(&context, "/entities/*").await.unwrap();
    assert_eq!(keys, ["/entities/alice", "/entities/bob"]);

    kv.del(&context, "/entities/bob").await.unwrap();
    assert_eq!(
        events.drain(),
        [
            Event::new(EventType::GroupUpdate, "eng"),
            Event::new(EventType::EntityUpdate, "bob"),
            Event::new(EventType::EntityUpdate, "alice"),
            Event::new(EventType::EntityDestroy, "bob"),
        ]
    );
}

#[tokio::test]
async fn reject_unsafe_keys() {
    let context = Context::fixture();
    let home = tempfile::tempdir().unwrap();
    let (backend, _) = open(&context, &home);
    let kv = Kv::from(backend);
    for key in ["/entities/../escape", "/entities/", "/other/thing"] {
        let error = kv.put(&context, key, Vec::new()).await.unwrap_err();
        assert!(matches!(
            Error::find(&error),
            Some(Error::MalformedRequest(_))
        ));
    }
}

#[tokio::test]
async fn watcher_reports_external_changes() {
    let context = Context::fixture();
    let home = tempfile::tempdir().unwrap();
    let (backend, events) = open(&context, &home);
    backend.watch(Duration::from_millis(20));
    let kv = Kv::from(backend);
    tokio::time::sleep(Duration::from_millis(50)).await;

    std::fs::write(home.path().join("groups/ops.dat"), b"external").unwrap();
    let mut received = Vec::new();
    for _ in 0..100 {
        received.extend(events.drain());
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(received, [Event::new(EventType::GroupUpdate, "ops")]);
    kv.close(&context).await.unwrap();
}
