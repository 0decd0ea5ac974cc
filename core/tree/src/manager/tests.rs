use netauth_context::Context;
use netauth_errors::Error;
use netauth_models::Capability;
use netauth_models::EntityMeta;
use netauth_models::Group;
use netauth_models::KvData;
use netauth_models::RuleMode;
use netauth_models::REDACTED_SECRET;

use super::KeyMode;
use super::Manager;
use super::MetaMode;

async fn manager_with_alice(context: &Context) -> Manager {
    let manager = Manager::fixture(context).await;
    manager
        .create_entity(context, "alice", -1, "secret")
        .await
        .unwrap();
    manager
}

#[tokio::test]
async fn create_fetch_redacts_secret() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    let alice = manager.fetch_entity(&context, "alice").await.unwrap();
    assert_eq!(alice.id, "alice");
    assert_eq!(alice.number, 1);
    assert_eq!(alice.secret, REDACTED_SECRET);

    let stored = manager.db().load_entity(&context, "alice").await.unwrap();
    assert_eq!(stored.secret, "secret");
}

#[tokio::test]
async fn create_rejects_duplicates() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    let error = manager
        .create_entity(&context, "alice", -1, "other")
        .await
        .unwrap_err();
    assert_eq!(
        Error::find(&error),
        Some(&Error::DuplicateEntityID("alice".into()))
    );

    let error = manager
        .create_entity(&context, "bob", 1, "other")
        .await
        .unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::DuplicateNumber(1)));

    manager.create_entity(&context, "bob", -1, "b").await.unwrap();
    manager.create_entity(&context, "carol", 10, "c").await.unwrap();
    manager.create_entity(&context, "dave", 0, "d").await.unwrap();
    assert_eq!(manager.fetch_entity(&context, "bob").await.unwrap().number, 2);
    assert_eq!(manager.fetch_entity(&context, "dave").await.unwrap().number, 11);
}

#[tokio::test]
async fn create_requires_id() {
    let context = Context::fixture();
    let manager = Manager::fixture(&context).await;
    let error = manager.create_entity(&context, "", -1, "s").await.unwrap_err();
    assert!(Error::MalformedRequest(String::new()).is_kind(&error));
}

#[tokio::test]
async fn destroy_entity() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    manager.destroy_entity(&context, "alice").await.unwrap();
    let error = manager.fetch_entity(&context, "alice").await.unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::UnknownEntity("alice".into())));
    let error = manager.destroy_entity(&context, "alice").await.unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::UnknownEntity("alice".into())));
}

#[tokio::test]
async fn secrets_and_locks() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    manager
        .validate_secret(&context, "alice", "secret")
        .await
        .unwrap();
    let error = manager
        .validate_secret(&context, "alice", "wrong")
        .await
        .unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::AuthorizationFailure));

    manager
        .set_entity_secret(&context, "alice", "changed")
        .await
        .unwrap();
    manager
        .validate_secret(&context, "alice", "changed")
        .await
        .unwrap();

    manager.lock_entity(&context, "alice").await.unwrap();
    let error = manager
        .validate_secret(&context, "alice", "changed")
        .await
        .unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::EntityLocked("alice".into())));
    manager.unlock_entity(&context, "alice").await.unwrap();
    manager
        .validate_secret(&context, "alice", "changed")
        .await
        .unwrap();
}

#[tokio::test]
async fn bootstrap_runs_once() {
    let context = Context::fixture();
    let manager = Manager::fixture(&context).await;
    manager.bootstrap(&context, "root", "s3cr3t").await.unwrap();
    manager.bootstrap(&context, "other", "s3cr3t").await.unwrap();
    let error = manager.fetch_entity(&context, "other").await.unwrap_err();
    assert!(Error::UnknownEntity(String::new()).is_kind(&error));
}

#[tokio::test]
async fn bootstrap_fixes_existing_entity() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    manager.lock_entity(&context, "alice").await.unwrap();
    manager.bootstrap(&context, "alice", "new").await.unwrap();

    let alice = manager.fetch_entity(&context, "alice").await.unwrap();
    assert!(!alice.is_locked());
    assert!(alice.has_capability(Capability::GlobalRoot));
    manager.validate_secret(&context, "alice", "new").await.unwrap();
}

#[tokio::test]
async fn required_entities_disable_bootstrap() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    manager.check_required_entities(&context).await.unwrap();
    manager.bootstrap(&context, "root", "s").await.unwrap();
    assert!(manager.fetch_entity(&context, "root").await.is_ok());

    let manager = manager_with_alice(&context).await;
    manager
        .set_entity_capability(&context, "alice", Capability::GlobalRoot)
        .await
        .unwrap();
    manager.check_required_entities(&context).await.unwrap();
    manager.bootstrap(&context, "root", "s").await.unwrap();
    assert!(manager.fetch_entity(&context, "root").await.is_err());
}

#[tokio::test]
async fn capabilities_are_idempotent() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    for _ in 0..2 {
        manager
            .set_entity_capability(&context, "alice", Capability::LockEntity)
            .await
            .unwrap();
    }
    let alice = manager.fetch_entity(&context, "alice").await.unwrap();
    assert_eq!(
        alice.meta.unwrap().capabilities,
        vec![Capability::LockEntity as i32]
    );

    manager
        .drop_entity_capability(&context, "alice", Capability::LockEntity)
        .await
        .unwrap();
    let alice = manager.fetch_entity(&context, "alice").await.unwrap();
    assert!(alice.meta.unwrap().capabilities.is_empty());
}

#[tokio::test]
async fn keys_by_type() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    manager
        .entity_keys(&context, "alice", KeyMode::Add, "ssh", "ssh-ed25519 AAAA alice@laptop")
        .await
        .unwrap();
    manager
        .entity_keys(&context, "alice", KeyMode::Add, "ssh", "ssh-ed25519 AAAA alice@laptop")
        .await
        .unwrap();
    manager
        .entity_keys(&context, "alice", KeyMode::Add, "gpg", "0xF00")
        .await
        .unwrap();

    let keys = manager
        .entity_keys(&context, "alice", KeyMode::Read, "SSH", "")
        .await
        .unwrap();
    assert_eq!(keys, vec!["SSH:ssh-ed25519 AAAA alice@laptop"]);
    let keys = manager
        .entity_keys(&context, "alice", KeyMode::Read, "*", "")
        .await
        .unwrap();
    assert_eq!(keys.len(), 2);

    manager
        .entity_keys(&context, "alice", KeyMode::Del, "ssh", "AAAA")
        .await
        .unwrap();
    let keys = manager
        .entity_keys(&context, "alice", KeyMode::Read, "*", "")
        .await
        .unwrap();
    assert_eq!(keys, vec!["GPG:0xF00"]);
}

#[tokio::test]
async fn metadata_merge() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    let meta = EntityMeta {
        display_name: Some("Alice".into()),
        shell: Some("/bin/zsh".into()),
        capabilities: vec![Capability::GlobalRoot as i32],
        ..Default::default()
    };
    manager
        .update_entity_meta(&context, "alice", meta)
        .await
        .unwrap();
    let meta = EntityMeta {
        shell: Some("/bin/bash".into()),
        ..Default::default()
    };
    manager
        .update_entity_meta(&context, "alice", meta)
        .await
        .unwrap();

    let alice = manager.fetch_entity(&context, "alice").await.unwrap();
    assert!(!alice.has_capability(Capability::GlobalRoot));
    let meta = alice.meta.unwrap();
    assert_eq!(meta.display_name.as_deref(), Some("Alice"));
    assert_eq!(meta.shell.as_deref(), Some("/bin/bash"));
}

#[tokio::test]
async fn untyped_metadata() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    for (key, value) in [("phone{home}", "555-1"), ("phone{work}", "555-2"), ("shoe", "42")] {
        manager
            .entity_um(&context, "alice", MetaMode::Upsert, key, value)
            .await
            .unwrap();
    }
    manager
        .entity_um(&context, "alice", MetaMode::Upsert, "shoe", "43")
        .await
        .unwrap();

    let found = manager
        .entity_um(&context, "alice", MetaMode::Read, "phone", "")
        .await
        .unwrap();
    assert_eq!(found, vec!["phone{home}:555-1", "phone{work}:555-2"]);
    let found = manager
        .entity_um(&context, "alice", MetaMode::Read, "shoe", "")
        .await
        .unwrap();
    assert_eq!(found, vec!["shoe:43"]);

    manager
        .entity_um(&context, "alice", MetaMode::ClearExact, "phone{work}", "")
        .await
        .unwrap();
    let found = manager
        .entity_um(&context, "alice", MetaMode::Read, "*", "")
        .await
        .unwrap();
    assert_eq!(found, vec!["phone{home}:555-1", "shoe:43"]);

    manager
        .entity_um(&context, "alice", MetaMode::ClearFuzzy, "phone", "")
        .await
        .unwrap();
    let found = manager
        .entity_um(&context, "alice", MetaMode::Read, "*", "")
        .await
        .unwrap();
    assert_eq!(found, vec!["shoe:43"]);
}

#[tokio::test]
async fn untyped_metadata_rejects_separator_in_key() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    manager.create_group(&context, "dev", "", "", -1).await.unwrap();

    let error = manager
        .entity_um(&context, "alice", MetaMode::Upsert, "a:b", "c")
        .await
        .unwrap_err();
    assert!(matches!(
        Error::find(&error),
        Some(Error::MalformedRequest(_)),
    ));
    let found = manager
        .entity_um(&context, "alice", MetaMode::Read, "*", "")
        .await
        .unwrap();
    assert!(found.is_empty());

    let error = manager
        .group_um(&context, "dev", MetaMode::Upsert, "a:b", "c")
        .await
        .unwrap_err();
    assert!(matches!(
        Error::find(&error),
        Some(Error::MalformedRequest(_)),
    ));
    let found = manager
        .group_um(&context, "dev", MetaMode::Read, "*", "")
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn direct_groups() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    let error = manager
        .add_entity_to_group(&context, "alice", "dev")
        .await
        .unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::UnknownGroup("dev".into())));

    manager.create_group(&context, "dev", "", "", -1).await.unwrap();
    manager
        .add_entity_to_group(&context, "alice", "dev")
        .await
        .unwrap();
    manager
        .add_entity_to_group(&context, "alice", "dev")
        .await
        .unwrap();
    let alice = manager.fetch_entity(&context, "alice").await.unwrap();
    let groups = manager.get_memberships(&context, &alice, false).await.unwrap();
    assert_eq!(groups, vec!["dev"]);

    manager
        .remove_entity_from_group(&context, "alice", "dev")
        .await
        .unwrap();
    let alice = manager.fetch_entity(&context, "alice").await.unwrap();
    let groups = manager.get_memberships(&context, &alice, true).await.unwrap();
    assert!(groups.is_empty());
}

#[tokio::test]
async fn search_redacts_secrets() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    let found = manager.search_entities(&context, "ID:ali*").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].secret, REDACTED_SECRET);

    let error = manager.search_entities(&context, "").await.unwrap_err();
    assert!(Error::BadSearch(String::new()).is_kind(&error));
}

#[tokio::test]
async fn group_lifecycle() {
    let context = Context::fixture();
    let manager = Manager::fixture(&context).await;
    manager
        .create_group(&context, "admins", "Administrators", "admins", -1)
        .await
        .unwrap();
    let error = manager
        .create_group(&context, "admins", "", "", -1)
        .await
        .unwrap_err();
    assert_eq!(
        Error::find(&error),
        Some(&Error::DuplicateGroupName("admins".into()))
    );
    let error = manager
        .create_group(&context, "dev", "", "ghosts", -1)
        .await
        .unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::UnknownGroup("ghosts".into())));
    manager
        .create_group(&context, "dev", "", "admins", 7)
        .await
        .unwrap();

    let admins = manager.fetch_group(&context, "admins").await.unwrap();
    assert_eq!(admins.number, 1);
    assert_eq!(admins.display_name.as_deref(), Some("Administrators"));
    assert_eq!(admins.managed_by.as_deref(), Some("admins"));
    let dev = manager.fetch_group(&context, "dev").await.unwrap();
    assert_eq!(dev.number, 7);
    assert_eq!(dev.managed_by.as_deref(), Some("admins"));

    let mut update = Group::with_name("dev");
    update.display_name = Some("Developers".into());
    update.managed_by = Some(String::new());
    update.number = 99;
    manager.update_group_meta(&context, &update).await.unwrap();
    let dev = manager.fetch_group(&context, "dev").await.unwrap();
    assert_eq!(dev.display_name.as_deref(), Some("Developers"));
    assert_eq!(dev.managed_by, None);
    assert_eq!(dev.number, 7);

    manager
        .set_group_capability(&context, "admins", Capability::GlobalRoot)
        .await
        .unwrap();
    let admins = manager.fetch_group(&context, "admins").await.unwrap();
    assert!(admins.has_capability(Capability::CreateEntity));
    manager
        .drop_group_capability(&context, "admins", Capability::GlobalRoot)
        .await
        .unwrap();

    manager.destroy_group(&context, "dev").await.unwrap();
    let error = manager.fetch_group(&context, "dev").await.unwrap_err();
    assert!(Error::UnknownGroup(String::new()).is_kind(&error));
    let found = manager.search_groups(&context, "name:admins").await.unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn group_metadata_and_kv() {
    let context = Context::fixture();
    let manager = Manager::fixture(&context).await;
    manager.create_group(&context, "dev", "", "", -1).await.unwrap();
    manager
        .group_um(&context, "dev", MetaMode::Upsert, "channel", "#dev")
        .await
        .unwrap();
    let found = manager
        .group_um(&context, "dev", MetaMode::Read, "channel", "")
        .await
        .unwrap();
    assert_eq!(found, vec!["channel:#dev"]);

    manager
        .group_kv_add(&context, "dev", KvData::new("owners", [(0, "alice")]))
        .await
        .unwrap();
    let error = manager
        .group_kv_add(&context, "dev", KvData::new("owners", [(0, "bob")]))
        .await
        .unwrap_err();
    assert!(Error::KeyExists(String::new()).is_kind(&error));
    manager
        .group_kv_replace(&context, "dev", KvData::new("owners", [(1, "carol"), (0, "bob")]))
        .await
        .unwrap();
    let records = manager.group_kv_get(&context, "dev", "*").await.unwrap();
    assert_eq!(records, vec![KvData::new("owners", [(0, "bob"), (1, "carol")])]);
    manager.group_kv_del(&context, "dev", "owners").await.unwrap();
    let error = manager
        .group_kv_get(&context, "dev", "owners")
        .await
        .unwrap_err();
    assert!(Error::NoSuchKey(String::new()).is_kind(&error));
}

#[tokio::test]
async fn rules_drop() {
    let context = Context::fixture();
    let manager = Manager::fixture(&context).await;
    for name in ["eng", "dev"] {
        manager.create_group(&context, name, "", "", -1).await.unwrap();
    }
    manager
        .modify_group_rule(&context, "eng", "dev", RuleMode::Include)
        .await
        .unwrap();
    let error = manager
        .modify_group_rule(&context, "eng", "dev", RuleMode::Exclude)
        .await
        .unwrap_err();
    assert!(Error::ExistingExpansion(String::new()).is_kind(&error));
    manager
        .modify_group_rule(&context, "eng", "dev", RuleMode::Drop)
        .await
        .unwrap();
    let eng = manager.fetch_group(&context, "eng").await.unwrap();
    assert!(eng.expansions.is_empty());
}

#[tokio::test]
async fn list_all_includes_locked() {
    let context = Context::fixture();
    let manager = manager_with_alice(&context).await;
    manager.create_entity(&context, "bob", -1, "b").await.unwrap();
    manager.lock_entity(&context, "bob").await.unwrap();
    let members = manager.list_members(&context, crate::ALL_GROUP).await.unwrap();
    let mut ids: Vec<String> = members.iter().map(|entity| entity.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["alice", "bob"]);
    assert!(members.iter().all(|entity| entity.secret == REDACTED_SECRET));

    let error = manager.list_members(&context, "nope").await.unwrap_err();
    assert!(Error::UnknownGroup(String::new()).is_kind(&error));
}
