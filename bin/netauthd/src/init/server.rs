//! NetAuth server initialisation as a builder.
use std::time::Duration;

use anyhow::Context as AnyContext;
use anyhow::Result;
use slog::Logger;
use tonic::Request;

use netauth_conf::Conf;
use netauth_context::Context;
use netauth_crypto::CryptoFactory;
use netauth_db::Db;
use netauth_errors::Error;
use netauth_health::DbCheck;
use netauth_health::HealthChecks;
use netauth_health::DB_CHECK;
use netauth_kv::KvFactory;
use netauth_kv::KvFactoryArgs;
use netauth_plugin::DiscoveryOpts;
use netauth_plugin::PluginManager;
use netauth_rpc::messages::Empty;
use netauth_rpc::NetAuthService;
use netauth_token::TokenFactory;
use netauth_tree::Manager;

use super::backends;
use super::backends::Backends;

/// Process builder to initialise and run a NetAuth server.
pub struct Server {
    backends: Backends,
    conf: Conf,
    logger: Logger,
}

/// Components of a started server, released on shutdown.
pub struct Running {
    pub db: Db,
    pub plugins: PluginManager,
    pub service: NetAuthService,
}

impl Server {
    /// Build a server from the loaded configuration.
    pub fn configure(conf: Conf) -> Self {
        let logger = crate::logging::configure(&conf.log);
        Self::with_logger(conf, logger)
    }

    /// Build a server from the loaded configuration, logging to the given [`Logger`].
    pub fn with_logger(conf: Conf, logger: Logger) -> Self {
        Server {
            backends: Backends::default(),
            conf,
            logger,
        }
    }

    /// Register a new factory for a crypto provider.
    ///
    /// # Panics
    ///
    /// This method panics if the name of the new crypto provider is already in use.
    pub fn register_crypto<B, S>(mut self, name: S, backend: B) -> Self
    where
        B: CryptoFactory + 'static,
        S: Into<String>,
    {
        self.backends.register_crypto(name, backend);
        self
    }

    /// Register a new factory for a storage backend.
    ///
    /// # Panics
    ///
    /// This method panics if the name of the new storage backend is already in use.
    pub fn register_kv<B, S>(mut self, name: S, backend: B) -> Self
    where
        B: KvFactory + 'static,
        S: Into<String>,
    {
        self.backends.register_kv(name, backend);
        self
    }

    /// Register a new factory for a token service.
    ///
    /// # Panics
    ///
    /// This method panics if the name of the new token service is already in use.
    pub fn register_tokens<B, S>(mut self, name: S, backend: B) -> Self
    where
        B: TokenFactory + 'static,
        S: Into<String>,
    {
        self.backends.register_tokens(name, backend);
        self
    }

    /// Register all supported backends for all process dependencies.
    ///
    /// Supported dependencies can be tuned at compile time using crate features.
    pub fn register_default_backends(mut self) -> Self {
        self.backends.register_defaults();
        self
    }

    /// Validate the listener configuration and the options of the selected backends.
    pub fn check(&self) -> Result<()> {
        let context = Context::root(self.logger.clone()).build();
        self.validate_conf(&context)
    }

    /// Finalise process initialisation and run the NetAuth server until interrupted.
    pub async fn run(self) -> Result<()> {
        let context = Context::root(self.logger.clone()).build();
        let running = self.start(&context).await?;
        slog::info!(
            context.logger, "NetAuth service assembled, no RPC listener is bound by this process";
            "bindaddr" => &self.conf.core.bindaddr,
            "port" => self.conf.core.port,
        );

        tokio::signal::ctrl_c()
            .await
            .context("unable to wait for the shutdown signal")?;
        slog::info!(context.logger, "Shutdown requested, stopping server");
        context.cancel.cancel();
        running.shutdown(&context).await
    }

    /// Initialise every server dependency and assemble the RPC service.
    pub async fn start(&self, context: &Context) -> Result<Running> {
        self.validate_conf(context)?;
        let conf = &self.conf;

        // Storage and search index.
        let kv_options = backends::kv_options(conf);
        let kv = self
            .backends
            .kv(&conf.core.db)?
            .kv(KvFactoryArgs {
                conf: &kv_options,
                context,
            })
            .await?;
        let db = Db::builder(kv)
            .buffer(conf.events.buffer)
            .open(context)
            .await?;

        let crypto = self
            .backends
            .crypto(&conf.core.crypto)?
            .crypto(context, &backends::crypto_options(conf))?;

        // Tree plugins and manager.
        let discovery = DiscoveryOpts {
            loadstatic: conf.plugin.loadstatic,
            list: conf.plugin.list.clone(),
            path: conf.plugin_dir(),
            call_timeout: conf.plugin.timeout.map(Duration::from_secs),
        };
        let plugins = PluginManager::discover(context, &discovery).await;
        slog::info!(context.logger, "Tree plugins loaded"; "plugins" => ?plugins.names());
        let manager = Manager::builder(db.clone(), crypto)
            .plugins(plugins.clone())
            .build(context)?;
        manager.check_required_entities(context).await?;
        if let Some((id, secret)) = conf.server.bootstrap_credentials() {
            manager.bootstrap(context, id, secret).await?;
        } else if conf.server.bootstrap.is_some() {
            slog::warn!(
                context.logger,
                "Ignoring malformed bootstrap option, expected 'id:secret'"
            );
        }

        let lifetime = Duration::from_secs(conf.token.lifetime);
        let tokens = self.backends.tokens(&conf.token.backend)?.service(
            context,
            &backends::token_options(conf),
            lifetime,
        )?;

        let mut health = HealthChecks::new();
        health.register(DB_CHECK, DbCheck(db.clone()));

        let service = NetAuthService::new(context, manager, tokens, health);
        let status = service
            .system_status(Request::new(Empty {}))
            .await
            .context(Error::internal("unable to run startup health checks"))?
            .into_inner();
        if !status.healthy {
            slog::warn!(
                context.logger, "Server started in degraded state";
                "first_failure" => &status.first_failure,
            );
        }

        Ok(Running {
            db,
            plugins,
            service,
        })
    }

    fn validate_conf(&self, context: &Context) -> Result<()> {
        let conf = &self.conf;
        if conf.tls.pwn_me {
            slog::crit!(
                context.logger,
                "TLS is disabled by tls.pwn_me, credentials and tokens travel in clear text!"
            );
        } else if conf.tls.certificate.is_none() || conf.tls.key.is_none() {
            anyhow::bail!(Error::FailedPrecondition(
                "tls.certificate and tls.key are required unless tls.pwn_me is set".into()
            ));
        }

        self.backends
            .kv(&conf.core.db)?
            .conf_check(context, &backends::kv_options(conf))
            .context("invalid storage backend options")?;
        self.backends
            .crypto(&conf.core.crypto)?
            .conf_check(context, &backends::crypto_options(conf))
            .context("invalid crypto provider options")?;
        self.backends
            .tokens(&conf.token.backend)?
            .conf_check(context, &backends::token_options(conf))
            .context("invalid token service options")?;
        Ok(())
    }
}

impl Running {
    /// Stop plugins and release storage.
    pub async fn shutdown(self, context: &Context) -> Result<()> {
        self.plugins.kill_all(context).await;
        self.db.close(context).await
    }
}
