//! RPC service exposing the NetAuth tree to clients.
//!
//! Methods are grouped in four families (auth, entity, group and system) and follow
//! the shape of unary gRPC handlers: they receive a [`Request`] with metadata and return
//! a [`Response`] or a [`Status`].
//!
//! Reads are open to everyone while every change requires a bearer token in the
//! `authorization` metadata carrying the capability for the change.
//! Members of the group named in a group's `managed_by` may change its members
//! without holding `MODIFY_GROUP_MEMBERS`.
use anyhow::Result;
use tonic::metadata::MetadataMap;
use tonic::Request;
use tonic::Response;
use tonic::Status;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_health::HealthChecks;
use netauth_token::TokenService;
use netauth_tree::KeyMode;
use netauth_tree::Manager;
use netauth_tree::MetaMode;

mod auth;
mod authz;
mod entity;
mod group;
pub mod messages;
mod status;
mod system;


pub use self::authz::bearer_token;
pub use self::authz::AUTHORIZATION;
pub use self::status::status;

/// Metadata key clients identify themselves with.
pub const CLIENT_NAME: &str = "client-name";

/// Metadata key clients identify the service they act for with.
pub const SERVICE_NAME: &str = "service-name";

/// Outcome of an RPC method.
pub type RpcResult<T> = std::result::Result<Response<T>, Status>;

/// Serve RPC requests by reading and changing the tree.
#[derive(Clone)]
pub struct NetAuthService {
    context: Context,
    health: HealthChecks,
    manager: Manager,
    tokens: TokenService,
}

impl NetAuthService {
    pub fn new(
        context: &Context,
        manager: Manager,
        tokens: TokenService,
        health: HealthChecks,
    ) -> NetAuthService {
        let context = context
            .derive()
            .log_values(slog::o!("component" => "rpc"))
            .build();
        NetAuthService {
            context,
            health,
            manager,
            tokens,
        }
    }

    /// Derive the context for a request, attaching the client identifying metadata.
    fn request_context<T>(&self, rpc: &'static str, request: &Request<T>) -> Context {
        let metadata = request.metadata();
        let client = metadata_str(metadata, CLIENT_NAME).unwrap_or("unknown").to_string();
        let service = metadata_str(metadata, SERVICE_NAME).unwrap_or("unknown").to_string();
        self.context
            .derive()
            .log_values(slog::o!(
                "rpc" => rpc,
                "client" => client,
                "service" => service,
            ))
            .build()
    }
}

fn metadata_str<'a>(metadata: &'a MetadataMap, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(|value| value.to_str().ok())
}

/// Convert the outcome of an operation into an RPC reply.
fn reply<T>(context: &Context, result: Result<T>) -> RpcResult<T> {
    result
        .map(Response::new)
        .map_err(|error| status(context, error))
}

fn required<T>(value: Option<T>, what: &str) -> Result<T> {
    match value {
        Some(value) => Ok(value),
        None => anyhow::bail!(Error::MalformedRequest(format!("{} is required", what))),
    }
}

fn parse_key_mode(action: &str) -> Result<KeyMode> {
    let mode = match action.to_ascii_uppercase().as_str() {
        "ADD" => KeyMode::Add,
        "DEL" | "DROP" => KeyMode::Del,
        "READ" | "LIST" => KeyMode::Read,
        _ => anyhow::bail!(Error::MalformedRequest(format!(
            "unknown key action '{}'",
            action
        ))),
    };
    Ok(mode)
}

fn parse_meta_mode(action: &str) -> Result<MetaMode> {
    let mode = match action.to_ascii_uppercase().as_str() {
        "READ" => MetaMode::Read,
        "UPSERT" => MetaMode::Upsert,
        "CLEARFUZZY" | "DEL" | "DROP" => MetaMode::ClearFuzzy,
        "CLEAREXACT" => MetaMode::ClearExact,
        _ => anyhow::bail!(Error::MalformedRequest(format!(
            "unknown metadata action '{}'",
            action
        ))),
    };
    Ok(mode)
}
