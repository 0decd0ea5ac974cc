//! Implement tree plugins.
//!
//! A plugin implements the [`Plugin`] trait, overriding the actions it cares about,
//! and calls [`serve`] from its `main` function.
//! Every action receives the record as currently known to the chain and the data
//! of the request that started the chain, and returns the (possibly modified) record.
//! Returned records are merged back into the chain.
use anyhow::Context as AnyContext;
use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;

use netauth_context::Context;
use netauth_models::Entity;
use netauth_models::Group;

use crate::protocol::Call;
use crate::protocol::EntityOpts;
use crate::protocol::GroupOpts;
use crate::protocol::Request;
use crate::protocol::Response;
use crate::protocol::MAGIC_COOKIE_KEY;
use crate::protocol::MAGIC_COOKIE_VALUE;
use crate::Action;

/// Logic of a tree plugin.
///
/// All actions default to returning the record unchanged.
#[async_trait::async_trait]
#[allow(unused_variables)]
pub trait Plugin: Send + Sync {
    async fn entity_create(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn entity_update(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn entity_lock(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn entity_unlock(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn entity_destroy(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn pre_secret_change(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn post_secret_change(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn pre_auth_check(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn post_auth_check(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn pre_token_auth(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn post_token_auth(&self, context: &Context, entity: Entity, data: Entity) -> Result<Entity> {
        Ok(entity)
    }

    async fn group_create(&self, context: &Context, group: Group, data: Group) -> Result<Group> {
        Ok(group)
    }

    async fn group_update(&self, context: &Context, group: Group, data: Group) -> Result<Group> {
        Ok(group)
    }

    async fn group_destroy(&self, context: &Context, group: Group, data: Group) -> Result<Group> {
        Ok(group)
    }
}

/// Route an entity processing call to the matching [`Plugin`] action.
pub async fn dispatch_entity<P>(plugin: &P, context: &Context, opts: EntityOpts) -> Result<Entity>
where
    P: Plugin + ?Sized,
{
    let EntityOpts {
        action,
        entity,
        data_entity: data,
    } = opts;
    match action {
        Action::EntityCreate => plugin.entity_create(context, entity, data).await,
        Action::EntityUpdate => plugin.entity_update(context, entity, data).await,
        Action::EntityLock => plugin.entity_lock(context, entity, data).await,
        Action::EntityUnlock => plugin.entity_unlock(context, entity, data).await,
        Action::EntityDestroy => plugin.entity_destroy(context, entity, data).await,
        Action::PreSecretChange => plugin.pre_secret_change(context, entity, data).await,
        Action::PostSecretChange => plugin.post_secret_change(context, entity, data).await,
        Action::PreAuthCheck => plugin.pre_auth_check(context, entity, data).await,
        Action::PostAuthCheck => plugin.post_auth_check(context, entity, data).await,
        Action::PreTokenAuth => plugin.pre_token_auth(context, entity, data).await,
        Action::PostTokenAuth => plugin.post_token_auth(context, entity, data).await,
        action => anyhow::bail!("action {} does not process entities", action),
    }
}

/// Route a group processing call to the matching [`Plugin`] action.
pub async fn dispatch_group<P>(plugin: &P, context: &Context, opts: GroupOpts) -> Result<Group>
where
    P: Plugin + ?Sized,
{
    let GroupOpts {
        action,
        group,
        data_group: data,
    } = opts;
    match action {
        Action::GroupCreate => plugin.group_create(context, group, data).await,
        Action::GroupUpdate => plugin.group_update(context, group, data).await,
        Action::GroupDestroy => plugin.group_destroy(context, group, data).await,
        action => anyhow::bail!("action {} does not process groups", action),
    }
}

/// Run the plugin side of the protocol over stdin and stdout.
///
/// Returns once the tree requests a shutdown or closes the plugin's stdin.
pub async fn serve<P>(context: &Context, plugin: P) -> Result<()>
where
    P: Plugin,
{
    let cookie = std::env::var(MAGIC_COOKIE_KEY).unwrap_or_default();
    if cookie != MAGIC_COOKIE_VALUE {
        anyhow::bail!(
            "this binary is a NetAuth tree plugin and must be started by the NetAuth server"
        );
    }

    let mut stdout = tokio::io::stdout();
    let handshake = format!("{}\n", crate::protocol::handshake());
    stdout.write_all(handshake.as_bytes()).await?;
    stdout.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(error) => {
                slog::warn!(context.logger, "Ignoring malformed request"; "error" => %error);
                continue;
            }
        };
        let response = match request.call {
            Call::Shutdown => break,
            Call::ProcessEntity(opts) => match dispatch_entity(&plugin, context, opts).await {
                Ok(entity) => Response::entity(request.id, entity),
                Err(error) => Response::failed(request.id, format!("{:#}", error)),
            },
            Call::ProcessGroup(opts) => match dispatch_group(&plugin, context, opts).await {
                Ok(group) => Response::group(request.id, group),
                Err(error) => Response::failed(request.id, format!("{:#}", error)),
            },
        };
        let mut encoded = serde_json::to_vec(&response).context("unable to encode response")?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Root context for plugin processes, logging to stderr.
pub fn plugin_context(name: &'static str) -> Context {
    use slog::Drain;
    let decorator = slog_term::PlainDecorator::new(std::io::stderr());
    let drain = slog_term::FullFormat::new(decorator).build();
    let drain = std::sync::Mutex::new(drain).fuse();
    let logger = slog::Logger::root(drain, slog::o!("plugin" => name));
    Context::root(logger).build()
}
