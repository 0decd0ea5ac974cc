//! Dependency backends registration and selection.
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use serde_json::Value as Json;

use netauth_conf::Conf;
use netauth_conf::KeyProvider;
use netauth_crypto::CryptoFactory;
use netauth_errors::Error;
use netauth_kv::KvFactory;
use netauth_token::TokenFactory;

/// Registers of backend factories for implementations supported by the process/build.
#[derive(Clone, Default)]
pub struct Backends {
    /// Supported password crypto providers.
    crypto: HashMap<String, Arc<dyn CryptoFactory>>,

    /// Supported storage backends.
    kv: HashMap<String, Arc<dyn KvFactory>>,

    /// Supported token services.
    tokens: HashMap<String, Arc<dyn TokenFactory>>,
}

impl Backends {
    /// Lookup a [`CryptoFactory`] by name.
    pub fn crypto(&self, name: &str) -> Result<&dyn CryptoFactory> {
        let factory = self
            .crypto
            .get(name)
            .ok_or_else(|| Error::UnknownCrypto(name.to_string()))?;
        Ok(factory.as_ref())
    }

    /// Lookup a [`KvFactory`] by name.
    pub fn kv(&self, name: &str) -> Result<&dyn KvFactory> {
        let factory = self
            .kv
            .get(name)
            .ok_or_else(|| Error::UnknownDatabase(name.to_string()))?;
        Ok(factory.as_ref())
    }

    /// Lookup a [`TokenFactory`] by name.
    pub fn tokens(&self, name: &str) -> Result<&dyn TokenFactory> {
        let factory = self
            .tokens
            .get(name)
            .ok_or_else(|| Error::UnknownTokenBackend(name.to_string()))?;
        Ok(factory.as_ref())
    }

    /// Register a new factory for a crypto provider.
    ///
    /// # Panics
    ///
    /// This method panics if the name of the new crypto provider is already in use.
    pub fn register_crypto<B, S>(&mut self, name: S, backend: B) -> &mut Self
    where
        B: CryptoFactory + 'static,
        S: Into<String>,
    {
        match self.crypto.entry(name.into()) {
            Entry::Occupied(entry) => {
                panic!(
                    "a CryptoFactory with name '{}' is already registered",
                    entry.key()
                )
            }
            Entry::Vacant(entry) => entry.insert(Arc::new(backend)),
        };
        self
    }

    /// Register a new factory for a storage backend.
    ///
    /// # Panics
    ///
    /// This method panics if the name of the new storage backend is already in use.
    pub fn register_kv<B, S>(&mut self, name: S, backend: B) -> &mut Self
    where
        B: KvFactory + 'static,
        S: Into<String>,
    {
        match self.kv.entry(name.into()) {
            Entry::Occupied(entry) => {
                panic!(
                    "a KvFactory with name '{}' is already registered",
                    entry.key()
                )
            }
            Entry::Vacant(entry) => entry.insert(Arc::new(backend)),
        };
        self
    }

    /// Register a new factory for a token service.
    ///
    /// # Panics
    ///
    /// This method panics if the name of the new token service is already in use.
    pub fn register_tokens<B, S>(&mut self, name: S, backend: B) -> &mut Self
    where
        B: TokenFactory + 'static,
        S: Into<String>,
    {
        match self.tokens.entry(name.into()) {
            Entry::Occupied(entry) => {
                panic!(
                    "a TokenFactory with name '{}' is already registered",
                    entry.key()
                )
            }
            Entry::Vacant(entry) => entry.insert(Arc::new(backend)),
        };
        self
    }

    /// Register all backends supported by this build.
    ///
    /// Optional backends can be tuned at compile time using crate features.
    pub fn register_defaults(&mut self) -> &mut Self {
        self.register_crypto("argon2", netauth_crypto::Argon2Factory)
            .register_crypto("nocrypto", netauth_crypto::NoCryptoFactory)
            .register_kv("filesystem", netauth_kv_filesystem::FilesystemFactory)
            .register_kv("memory", netauth_kv::MemoryFactory)
            .register_tokens("hmac", netauth_token::HmacFactory)
            .register_tokens("insecure", netauth_token::InsecureFactory);
        #[cfg(feature = "redis")]
        self.register_kv("redis", netauth_kv_redis::RedisFactory);
        self
    }
}

/// Options passed to the selected crypto provider.
pub fn crypto_options(conf: &Conf) -> Json {
    conf.crypto.clone()
}

/// Options passed to the selected storage backend.
///
/// Only the `filesystem` and `redis` backends take options.
pub fn kv_options(conf: &Conf) -> Json {
    match conf.core.db.as_str() {
        "filesystem" => json!({
            "home": conf.data_dir(),
            "watcher": conf.pdb.watcher,
            "watch-interval": conf.pdb.watch_interval,
        }),
        "redis" => json!({
            "url": conf.redis.url,
            "prefix": conf.redis.prefix,
        }),
        _ => Json::Null,
    }
}

/// Options passed to the selected token service.
pub fn token_options(conf: &Conf) -> Json {
    if conf.token.backend != "hmac" {
        return Json::Null;
    }
    match conf.token.keyprovider {
        KeyProvider::Fs => json!({"key-file": conf.token_key_file()}),
        KeyProvider::Inline => json!({"key": conf.token.key}),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;
    use serde_json::Value as Json;

    use netauth_conf::Conf;
    use netauth_conf::KeyProvider;
    use netauth_context::Context;
    use netauth_errors::Error;

    use super::Backends;

    fn backends() -> Backends {
        let mut backends = Backends::default();
        backends.register_defaults();
        backends
    }

    fn conf() -> Conf {
        let mut conf = Conf::default();
        conf.core.home = PathBuf::from("/srv/netauth");
        conf
    }

    #[test]
    fn default_backends_registered() {
        let backends = backends();
        assert!(backends.crypto("argon2").is_ok());
        assert!(backends.crypto("nocrypto").is_ok());
        assert!(backends.kv("filesystem").is_ok());
        assert!(backends.kv("memory").is_ok());
        assert!(backends.tokens("hmac").is_ok());
        assert!(backends.tokens("insecure").is_ok());
    }

    #[test]
    fn unknown_backends() {
        let backends = backends();
        let error = backends.kv("bolt").err().unwrap();
        assert_eq!(
            Error::find(&error),
            Some(&Error::UnknownDatabase("bolt".into())),
        );
        let error = backends.crypto("bcrypt").err().unwrap();
        assert_eq!(
            Error::find(&error),
            Some(&Error::UnknownCrypto("bcrypt".into())),
        );
        let error = backends.tokens("jwt").err().unwrap();
        assert_eq!(
            Error::find(&error),
            Some(&Error::UnknownTokenBackend("jwt".into())),
        );
    }

    #[test]
    #[should_panic(expected = "a KvFactory with name 'memory' is already registered")]
    fn duplicate_registration_panics() {
        let mut backends = backends();
        backends.register_kv("memory", netauth_kv::MemoryFactory);
    }

    #[test]
    fn filesystem_options() {
        let mut conf = conf();
        conf.pdb.watcher = true;
        conf.pdb.watch_interval = 5;
        let options = super::kv_options(&conf);
        assert_eq!(
            options,
            json!({"home": "/srv/netauth/pdb", "watcher": true, "watch-interval": 5}),
        );

        let context = Context::fixture();
        let backends = backends();
        let factory = backends.kv("filesystem").unwrap();
        factory.conf_check(&context, &options).unwrap();
    }

    #[test]
    fn redis_options() {
        let mut conf = conf();
        conf.core.db = "redis".into();
        conf.redis.url = Some("redis://localhost:6379/0".into());
        conf.redis.prefix = "netauth".into();
        let options = super::kv_options(&conf);
        assert_eq!(
            options,
            json!({"url": "redis://localhost:6379/0", "prefix": "netauth"}),
        );
    }

    #[test]
    fn memory_options() {
        let mut conf = conf();
        conf.core.db = "memory".into();
        assert_eq!(super::kv_options(&conf), Json::Null);
    }

    #[test]
    fn token_options_from_key_file() {
        let conf = conf();
        assert_eq!(
            super::token_options(&conf),
            json!({"key-file": "/srv/netauth/keys/token.key"}),
        );
    }

    #[test]
    fn token_options_inline() {
        let mut conf = conf();
        conf.token.keyprovider = KeyProvider::Inline;
        conf.token.key = Some("sekrit".into());
        let options = super::token_options(&conf);
        assert_eq!(options, json!({"key": "sekrit"}));

        let context = Context::fixture();
        let backends = backends();
        let factory = backends.tokens("hmac").unwrap();
        factory.conf_check(&context, &options).unwrap();
    }

    #[test]
    fn insecure_tokens_take_no_options() {
        let mut conf = conf();
        conf.token.backend = "insecure".into();
        assert_eq!(super::token_options(&conf), Json::Null);
    }
}
