//! Initialise filesystem KV backends.
use std::time::Duration;

use anyhow::Context as AnyContext;
use anyhow::Result;
use serde_json::Value as Json;

use netauth_context::Context;
use netauth_kv::Kv;
use netauth_kv::KvFactory;
use netauth_kv::KvFactoryArgs;

use crate::Conf;
use crate::ConfError;
use crate::FilesystemKv;

/// Initialise filesystem KV backends.
pub struct FilesystemFactory;

#[async_trait::async_trait]
impl KvFactory for FilesystemFactory {
    fn conf_check(&self, _: &Context, conf: &Json) -> Result<()> {
        serde_json::from_value::<Conf>(conf.clone()).context(ConfError)?;
        Ok(())
    }

    async fn kv<'a>(&self, args: KvFactoryArgs<'a>) -> Result<Kv> {
        let conf: Conf = serde_json::from_value(args.conf.clone()).context(ConfError)?;
        let backend = FilesystemKv::open(args.context, &conf.home)?;
        if conf.watcher {
            backend.watch(Duration::from_secs(conf.watch_interval.max(1)));
        }
        slog::info!(args.context.logger, "Filesystem storage ready"; "home" => &conf.home);
        Ok(Kv::from(backend))
    }
}
