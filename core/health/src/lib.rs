//! Named health checks reporting on the state of server subsystems.
//!
//! Checks are registered during startup and run on demand to build a [`SystemStatus`].
//! The order in which checks are registered is the order they are reported in,
//! which also decides which failing subsystem is reported first.
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use netauth_context::Context;
use netauth_db::Db;

/// Health check name for the database subsystem.
pub const DB_CHECK: &str = "db";

/// Generic health check for a subsystem.
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    /// Execute the check, returning an error describing the fault if the subsystem is unhealthy.
    async fn check(&self, context: &Context) -> Result<()>;
}

/// Checks the storage behind a [`Db`] is able to list and serve records.
pub struct DbCheck(pub Db);

#[async_trait::async_trait]
impl HealthCheck for DbCheck {
    async fn check(&self, context: &Context) -> Result<()> {
        self.0.health(context).await
    }
}

/// Health of an individual subsystem.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubsystemStatus {
    pub ok: bool,
    pub name: String,
    pub fault: Option<String>,
}

/// Aggregated health of all registered subsystems.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// All checks passed.
    pub healthy: bool,

    /// Name of the first subsystem found to be unhealthy.
    pub first_failure: Option<String>,

    /// Results of each check, in registration order.
    pub checks: Vec<SubsystemStatus>,
}

/// Health check register.
#[derive(Clone, Default)]
pub struct HealthChecks {
    checks: Vec<(String, Arc<dyn HealthCheck>)>,
}

impl HealthChecks {
    pub fn new() -> HealthChecks {
        HealthChecks::default()
    }

    /// Register a named health check.
    ///
    /// Check names are exposed to operators and should be meaningful for them.
    ///
    /// If a check with the given name already exists it is replaced in place.
    pub fn register<C, S>(&mut self, name: S, check: C)
    where
        C: HealthCheck + 'static,
        S: Into<String>,
    {
        let name = name.into();
        let check: Arc<dyn HealthCheck> = Arc::new(check);
        match self.checks.iter_mut().find(|(known, _)| *known == name) {
            Some(entry) => entry.1 = check,
            None => self.checks.push((name, check)),
        }
    }

    /// Run all the registered checks and report the results.
    pub async fn run(&self, context: &Context) -> SystemStatus {
        let mut status = SystemStatus {
            healthy: true,
            first_failure: None,
            checks: Vec::with_capacity(self.checks.len()),
        };
        for (name, check) in &self.checks {
            let fault = match check.check(context).await {
                Ok(()) => None,
                Err(error) => {
                    slog::warn!(
                        context.logger, "Health check failed";
                        "check" => name,
                        "error" => format!("{:#}", error),
                    );
                    Some(format!("{:#}", error))
                }
            };
            if fault.is_some() && status.healthy {
                status.healthy = false;
                status.first_failure = Some(name.clone());
            }
            status.checks.push(SubsystemStatus {
                ok: fault.is_none(),
                name: name.clone(),
                fault,
            });
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use anyhow::Result;

    use netauth_context::Context;
    use netauth_db::Db;
    use netauth_errors::Error;
    use netauth_kv::Kv;
    use netauth_kv_filesystem::FilesystemKv;

    use super::DbCheck;
    use super::HealthCheck;
    use super::HealthChecks;
    use super::DB_CHECK;

    struct Broken(&'static str);

    #[async_trait::async_trait]
    impl HealthCheck for Broken {
        async fn check(&self, _: &Context) -> Result<()> {
            anyhow::bail!(Error::internal(self.0))
        }
    }

    struct Fine;

    #[async_trait::async_trait]
    impl HealthCheck for Fine {
        async fn check(&self, _: &Context) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn empty_register_is_healthy() {
        let context = Context::fixture();
        let status = HealthChecks::new().run(&context).await;
        assert!(status.healthy);
        assert_eq!(status.first_failure, None);
        assert!(status.checks.is_empty());
    }

    #[tokio::test]
    async fn first_failure_reported() {
        let context = Context::fixture();
        let mut checks = HealthChecks::new();
        checks.register("fine", Fine);
        checks.register("plugins", Broken("plugin gone"));
        checks.register("tokens", Broken("no key"));
        let status = checks.run(&context).await;
        assert!(!status.healthy);
        assert_eq!(status.first_failure.as_deref(), Some("plugins"));
        let names: Vec<&str> = status.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["fine", "plugins", "tokens"]);
        assert!(status.checks[0].ok);
        assert_eq!(status.checks[0].fault, None);
        assert!(!status.checks[2].ok);
        assert!(status.checks[2].fault.as_ref().unwrap().contains("no key"));
    }

    #[tokio::test]
    async fn register_replaces_in_place() {
        let context = Context::fixture();
        let mut checks = HealthChecks::new();
        checks.register("a", Broken("down"));
        checks.register("b", Fine);
        checks.register("a", Fine);
        let status = checks.run(&context).await;
        assert!(status.healthy);
        assert_eq!(status.checks.len(), 2);
        assert_eq!(status.checks[0].name, "a");
    }

    #[tokio::test]
    async fn db_check_passes_in_memory() {
        let context = Context::fixture();
        let db = Db::fixture(&context).await;
        let mut checks = HealthChecks::new();
        checks.register(DB_CHECK, DbCheck(db));
        assert!(checks.run(&context).await.healthy);
    }

    #[tokio::test]
    async fn db_check_detects_loose_permissions() {
        let context = Context::fixture();
        let home = tempfile::tempdir().unwrap();
        let kv = FilesystemKv::open(&context, home.path()).unwrap();
        let db = Db::builder(Kv::from(kv)).open(&context).await.unwrap();
        let mut checks = HealthChecks::new();
        checks.register(DB_CHECK, DbCheck(db));
        assert!(checks.run(&context).await.healthy);

        let groups = home.path().join("groups");
        std::fs::set_permissions(&groups, std::fs::Permissions::from_mode(0o777)).unwrap();
        let status = checks.run(&context).await;
        assert!(!status.healthy);
        assert_eq!(status.first_failure.as_deref(), Some(DB_CHECK));
        assert!(status.checks[0].fault.as_ref().unwrap().contains("mode 777"));
    }
}
