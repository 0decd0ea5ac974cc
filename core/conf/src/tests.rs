use std::io::Write;
use std::path::PathBuf;

use crate::load;
use crate::Conf;
use crate::Error;
use crate::KeyProvider;
use crate::LogFormat;
use crate::LogLevel;

fn conf_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn empty_document_uses_defaults() {
    let file = conf_file("{}\n");
    let conf = load(file.path()).unwrap();
    assert_eq!(conf, Conf::default());
    assert_eq!(conf.core.port, 1729);
    assert_eq!(conf.core.db, "filesystem");
    assert_eq!(conf.core.crypto, "argon2");
    assert_eq!(conf.token.backend, "hmac");
    assert_eq!(conf.token.lifetime, 600);
    assert_eq!(conf.token.keyprovider, KeyProvider::Fs);
    assert_eq!(conf.pdb.watch_interval, 1);
    assert_eq!(conf.events.buffer, 0);
    assert!(!conf.tls.pwn_me);
    assert_eq!(conf.log.level, LogLevel::Info);
    assert_eq!(conf.server.bootstrap_credentials(), None);
}

#[test]
fn full_document() {
    let file = conf_file(
        r#"
core:
  home: /srv/netauth
  port: 8080
  bindaddr: 0.0.0.0
  db: redis
crypto:
  iterations: 3
tls:
  pwn_me: true
token:
  keyprovider: inline
  key: s3cr3t
  lifetime: 60
plugin:
  loadstatic: true
  list:
    - /opt/fail2lock.treeplugin
  timeout: 3
pdb:
  watcher: true
  watch-interval: 5
redis:
  url: redis://localhost:6379/0
events:
  buffer: 128
log:
  level: debug
  format: term
  async: false
server:
  bootstrap: root:s3cr3t
"#,
    );
    let conf = load(file.path()).unwrap();
    assert_eq!(conf.core.home, PathBuf::from("/srv/netauth"));
    assert_eq!(conf.core.port, 8080);
    assert_eq!(conf.core.db, "redis");
    assert_eq!(conf.crypto["iterations"], 3);
    assert!(conf.tls.pwn_me);
    assert_eq!(conf.token.keyprovider, KeyProvider::Inline);
    assert_eq!(conf.token.key.as_deref(), Some("s3cr3t"));
    assert_eq!(conf.token.lifetime, 60);
    assert_eq!(
        conf.plugin.list,
        vec![PathBuf::from("/opt/fail2lock.treeplugin")]
    );
    assert_eq!(conf.plugin.timeout, Some(3));
    assert!(conf.pdb.watcher);
    assert_eq!(conf.pdb.watch_interval, 5);
    assert_eq!(conf.redis.url.as_deref(), Some("redis://localhost:6379/0"));
    assert_eq!(conf.events.buffer, 128);
    assert_eq!(conf.log.level, LogLevel::Debug);
    assert_eq!(conf.log.format, LogFormat::Term);
    assert!(!conf.log.async_);
    assert_eq!(
        conf.server.bootstrap_credentials(),
        Some(("root", "s3cr3t"))
    );
}

#[test]
fn derived_paths_follow_home() {
    let mut conf = Conf::default();
    conf.core.home = PathBuf::from("/srv/netauth");
    assert_eq!(conf.data_dir(), PathBuf::from("/srv/netauth/pdb"));
    assert_eq!(conf.plugin_dir(), PathBuf::from("/srv/netauth/plugins"));
    assert_eq!(
        conf.token_key_file(),
        PathBuf::from("/srv/netauth/keys/token.key")
    );

    conf.plugin.path = Some(PathBuf::from("/opt/plugins"));
    assert_eq!(conf.plugin_dir(), PathBuf::from("/opt/plugins"));
}

#[test]
fn malformed_bootstrap_ignored() {
    let mut conf = Conf::default();
    for value in ["root", ":s3cr3t", "root:"] {
        conf.server.bootstrap = Some(value.into());
        assert_eq!(conf.server.bootstrap_credentials(), None);
    }
}

#[test]
fn missing_file() {
    let error = load("/this/path/does/not/exist.yaml").unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::PathNotFound(_))
    ));
}

#[test]
fn invalid_document() {
    let file = conf_file("core:\n  port: not-a-port\n");
    let error = load(file.path()).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::Decode(_))
    ));
}
