//! End-to-end behaviour of the tree over in-memory storage.
use netauth_context::Context;
use netauth_crypto::Crypto;
use netauth_db::Db;
use netauth_errors::Error;
use netauth_models::Capability;
use netauth_models::KvData;
use netauth_models::RuleMode;
use netauth_models::REDACTED_SECRET;
use netauth_plugin::PluginManager;
use netauth_plugin_fail2lock::Fail2Lock;
use netauth_tree::Manager;
use netauth_tree::MetaMode;

async fn manager(context: &Context, plugins: PluginManager) -> Manager {
    let db = Db::fixture(context).await;
    Manager::builder(db, Crypto::fixture())
        .plugins(plugins)
        .build(context)
        .unwrap()
}

fn ids(entities: Vec<netauth_models::Entity>) -> Vec<String> {
    let mut ids: Vec<String> = entities.into_iter().map(|entity| entity.id).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn bootstrap_creates_root() {
    let context = Context::fixture();
    let manager = manager(&context, PluginManager::default()).await;
    manager.bootstrap(&context, "root", "s3cr3t").await.unwrap();

    let root = manager.fetch_entity(&context, "root").await.unwrap();
    assert_eq!(root.number, 1);
    assert_eq!(root.secret, REDACTED_SECRET);
    assert!(!root.is_locked());
    let meta = root.meta.unwrap();
    assert_eq!(meta.capabilities, vec![Capability::GlobalRoot as i32]);
    manager
        .validate_secret(&context, "root", "s3cr3t")
        .await
        .unwrap();
}

#[tokio::test]
async fn membership_via_include() {
    let context = Context::fixture();
    let manager = manager(&context, PluginManager::default()).await;
    for name in ["eng", "dev", "ops"] {
        manager.create_group(&context, name, "", "", -1).await.unwrap();
    }
    manager
        .modify_group_rule(&context, "eng", "dev", RuleMode::Include)
        .await
        .unwrap();
    manager
        .modify_group_rule(&context, "eng", "ops", RuleMode::Include)
        .await
        .unwrap();
    manager.create_entity(&context, "alice", -1, "a").await.unwrap();
    manager
        .add_entity_to_group(&context, "alice", "dev")
        .await
        .unwrap();

    let alice = manager.fetch_entity(&context, "alice").await.unwrap();
    let groups = manager.get_memberships(&context, &alice, true).await.unwrap();
    assert!(groups.contains(&"dev".to_string()));
    assert!(groups.contains(&"eng".to_string()));
    assert!(!groups.contains(&"ops".to_string()));

    let members = manager.list_members(&context, "eng").await.unwrap();
    assert_eq!(ids(members), vec!["alice"]);
    let members = manager.list_members(&context, "ops").await.unwrap();
    assert!(members.is_empty());
}

#[tokio::test]
async fn exclude_takes_precedence() {
    let context = Context::fixture();
    let manager = manager(&context, PluginManager::default()).await;
    for name in ["prod-data", "staff", "contractors"] {
        manager.create_group(&context, name, "", "", -1).await.unwrap();
    }
    manager
        .modify_group_rule(&context, "prod-data", "staff", RuleMode::Include)
        .await
        .unwrap();
    manager
        .modify_group_rule(&context, "prod-data", "contractors", RuleMode::Exclude)
        .await
        .unwrap();
    for id in ["bob", "carol"] {
        manager.create_entity(&context, id, -1, id).await.unwrap();
        manager
            .add_entity_to_group(&context, id, "staff")
            .await
            .unwrap();
    }
    manager
        .add_entity_to_group(&context, "carol", "contractors")
        .await
        .unwrap();

    let members = manager.list_members(&context, "prod-data").await.unwrap();
    assert_eq!(ids(members), vec!["bob"]);
    let members = manager.list_members(&context, "staff").await.unwrap();
    assert_eq!(ids(members), vec!["bob", "carol"]);
}

#[tokio::test]
async fn kv_lifecycle() {
    let context = Context::fixture();
    let manager = manager(&context, PluginManager::default()).await;
    manager.create_entity(&context, "alice", -1, "a").await.unwrap();

    let phone = KvData::new("phone", [(0, "555-1"), (1, "555-2")]);
    manager
        .entity_kv_add(&context, "alice", phone.clone())
        .await
        .unwrap();
    let records = manager
        .entity_kv_get(&context, "alice", "phone")
        .await
        .unwrap();
    assert_eq!(records, vec![phone.clone()]);

    let error = manager
        .entity_kv_add(&context, "alice", phone)
        .await
        .unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::KeyExists("phone".into())));

    let replaced = KvData::new("phone", [(0, "555-9")]);
    manager
        .entity_kv_replace(&context, "alice", replaced.clone())
        .await
        .unwrap();
    let records = manager
        .entity_kv_get(&context, "alice", "*")
        .await
        .unwrap();
    assert_eq!(records, vec![replaced]);

    manager
        .entity_kv_del(&context, "alice", "phone")
        .await
        .unwrap();
    let error = manager
        .entity_kv_del(&context, "alice", "phone")
        .await
        .unwrap_err();
    assert_eq!(Error::find(&error), Some(&Error::NoSuchKey("phone".into())));
}

#[tokio::test]
async fn plugin_locks_out_failed_attempts() {
    let context = Context::fixture();
    let plugins = PluginManager::fixture(vec![("fail2lock", Fail2Lock::new(3))]);
    let manager = manager(&context, plugins).await;
    manager.create_entity(&context, "alice", -1, "right").await.unwrap();

    for _ in 0..3 {
        let error = manager
            .validate_secret(&context, "alice", "wrong")
            .await
            .unwrap_err();
        assert_eq!(Error::find(&error), Some(&Error::AuthorizationFailure));
    }
    for secret in ["wrong", "right"] {
        let error = manager
            .validate_secret(&context, "alice", secret)
            .await
            .unwrap_err();
        assert_eq!(Error::find(&error), Some(&Error::EntityLocked("alice".into())));
    }

    // The lock out is never stored on the entity.
    let alice = manager.fetch_entity(&context, "alice").await.unwrap();
    assert!(!alice.is_locked());

    manager
        .entity_um(&context, "alice", MetaMode::Upsert, "fail2lock", "RESET")
        .await
        .unwrap();
    let found = manager
        .entity_um(&context, "alice", MetaMode::Read, "*", "")
        .await
        .unwrap();
    assert!(found.is_empty());
    manager
        .validate_secret(&context, "alice", "right")
        .await
        .unwrap();
}

#[tokio::test]
async fn cycles_are_rejected() {
    let context = Context::fixture();
    let manager = manager(&context, PluginManager::default()).await;
    for name in ["a", "b", "c"] {
        manager.create_group(&context, name, "", "", -1).await.unwrap();
    }
    manager
        .modify_group_rule(&context, "a", "b", RuleMode::Include)
        .await
        .unwrap();
    manager
        .modify_group_rule(&context, "b", "c", RuleMode::Include)
        .await
        .unwrap();

    let error = manager
        .modify_group_rule(&context, "c", "a", RuleMode::Include)
        .await
        .unwrap_err();
    assert!(Error::ExistingExpansion(String::new()).is_kind(&error));
    let c = manager.fetch_group(&context, "c").await.unwrap();
    assert!(c.expansions.is_empty());
}
