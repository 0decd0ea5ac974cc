//! KV backend storing records in a Redis server.
//!
//! Records are stored as plain string values under their KV key, optionally
//! namespaced with a configurable prefix so multiple trees can share a server.
use anyhow::Context as AnyContext;
use anyhow::Result;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as Json;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_events::EventBus;
use netauth_kv::EventEmitter;
use netauth_kv::Kv;
use netauth_kv::KvBackend;
use netauth_kv::KvCapability;
use netauth_kv::KvFactory;
use netauth_kv::KvFactoryArgs;

const CAPABILITIES: &[KvCapability] = &[KvCapability::Mutable, KvCapability::EmitsEvents];

/// Redis specific configuration for the KV interface.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// URL of the Redis server, such as `redis://localhost:6379/0`.
    pub url: String,

    /// Prefix added to every key stored in Redis.
    #[serde(default)]
    pub prefix: String,
}

/// The Redis KV backend configuration is not valid.
#[derive(Debug, thiserror::Error)]
#[error("the Redis KV backend configuration is not valid")]
pub struct ConfError;

/// Store records in a Redis server.
pub struct RedisKv {
    connection: ConnectionManager,
    emitter: EventEmitter,
    prefix: String,
}

impl RedisKv {
    /// Connect to the Redis server.
    pub async fn connect(conf: &Conf) -> Result<RedisKv> {
        let client = redis::Client::open(conf.url.as_str()).context(ConfError)?;
        let connection = client
            .get_connection_manager()
            .await
            .with_context(|| Error::internal(format!("unable to connect to {}", conf.url)))?;
        Ok(RedisKv {
            connection,
            emitter: EventEmitter::default(),
            prefix: conf.prefix.clone(),
        })
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait::async_trait]
impl KvBackend for RedisKv {
    fn capabilities(&self) -> &'static [KvCapability] {
        CAPABILITIES
    }

    async fn close(&self, _: &Context) -> Result<()> {
        Ok(())
    }

    async fn del(&self, context: &Context, key: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let removed: i64 = connection
            .del(self.redis_key(key))
            .await
            .with_context(|| Error::internal(format!("unable to delete {}", key)))?;
        if removed > 0 {
            self.emitter.emit(context, key, true).await;
        }
        Ok(())
    }

    async fn get(&self, _: &Context, key: &str) -> Result<Vec<u8>> {
        let mut connection = self.connection.clone();
        let value: Option<Vec<u8>> = connection
            .get(self.redis_key(key))
            .await
            .with_context(|| Error::internal(format!("unable to read {}", key)))?;
        match value {
            None => anyhow::bail!(Error::NoValue(key.to_string())),
            Some(value) => Ok(value),
        }
    }

    async fn keys(&self, _: &Context, pattern: &glob::Pattern) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();
        let found: Vec<String> = connection
            .keys(format!("{}*", self.prefix))
            .await
            .context(Error::internal("unable to list keys"))?;
        let mut keys: Vec<String> = found
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(String::from))
            .filter(|key| pattern.matches(key))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn put(&self, context: &Context, key: &str, value: Vec<u8>) -> Result<()> {
        let mut connection = self.connection.clone();
        connection
            .set::<_, _, ()>(self.redis_key(key), value)
            .await
            .with_context(|| Error::internal(format!("unable to write {}", key)))?;
        self.emitter.emit(context, key, false).await;
        Ok(())
    }

    fn set_events(&self, events: EventBus) {
        self.emitter.install(events)
    }
}

/// Initialise Redis KV backends.
pub struct RedisFactory;

#[async_trait::async_trait]
impl KvFactory for RedisFactory {
    fn conf_check(&self, _: &Context, conf: &Json) -> Result<()> {
        let conf: Conf = serde_json::from_value(conf.clone()).context(ConfError)?;
        redis::Client::open(conf.url.as_str()).context(ConfError)?;
        Ok(())
    }

    async fn kv<'a>(&self, args: KvFactoryArgs<'a>) -> Result<Kv> {
        let conf: Conf = serde_json::from_value(args.conf.clone()).context(ConfError)?;
        let backend = RedisKv::connect(&conf).await?;
        slog::info!(args.context.logger, "Redis storage ready"; "url" => &conf.url);
        Ok(Kv::from(backend))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use netauth_context::Context;
    use netauth_kv::KvFactory;

    use super::ConfError;
    use super::RedisFactory;

    #[test]
    fn conf_check_accepts_url() {
        let context = Context::fixture();
        let conf = json!({"url": "redis://localhost:6379/0"});
        RedisFactory.conf_check(&context, &conf).unwrap();
    }

    #[test]
    fn conf_check_rejects_missing_url() {
        let context = Context::fixture();
        let error = RedisFactory.conf_check(&context, &json!({})).unwrap_err();
        assert!(error.is::<ConfError>());
    }

    #[test]
    fn conf_check_rejects_bad_url() {
        let context = Context::fixture();
        let conf = json!({"url": "not a url"});
        let error = RedisFactory.conf_check(&context, &conf).unwrap_err();
        assert!(error.is::<ConfError>());
    }
}
