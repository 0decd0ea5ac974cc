//! System methods.
use anyhow::Result;
use tonic::Request;

use netauth_errors::Error;
use netauth_models::Capability;

use crate::messages::CapabilityRequest;
use crate::messages::Empty;
use crate::messages::StatusReply;
use crate::reply;
use crate::NetAuthService;
use crate::RpcResult;

impl NetAuthService {
    /// Grant or revoke a capability to an entity or group.
    ///
    /// Only holders of `GLOBAL_ROOT` may change capabilities.
    pub async fn system_capabilities(
        &self,
        request: Request<CapabilityRequest>,
    ) -> RpcResult<Empty> {
        let context = self.request_context("SystemCapabilities", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            let claims = self.require(&context, &metadata, Capability::GlobalRoot)?;
            let capability: Capability = request.capability.parse()?;
            let add = match request.action.to_ascii_uppercase().as_str() {
                "ADD" => true,
                "DROP" | "DEL" => false,
                _ => anyhow::bail!(Error::MalformedRequest(format!(
                    "unknown capability action '{}'",
                    request.action
                ))),
            };
            match (request.entity.as_deref(), request.group.as_deref()) {
                (Some(id), None) if add => {
                    self.manager
                        .set_entity_capability(&context, id, capability)
                        .await?
                }
                (Some(id), None) => {
                    self.manager
                        .drop_entity_capability(&context, id, capability)
                        .await?
                }
                (None, Some(name)) if add => {
                    self.manager
                        .set_group_capability(&context, name, capability)
                        .await?
                }
                (None, Some(name)) => {
                    self.manager
                        .drop_group_capability(&context, name, capability)
                        .await?
                }
                _ => anyhow::bail!(Error::MalformedRequest(
                    "exactly one of entity or group is required".into()
                )),
            }
            slog::info!(
                context.logger, "Capabilities changed";
                "capability" => capability.as_str(),
                "grant" => add,
                "requestor" => &claims.entity_id,
            );
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    /// Check the server is able to respond.
    pub async fn system_ping(&self, request: Request<Empty>) -> RpcResult<Empty> {
        let context = self.request_context("SystemPing", &request);
        slog::trace!(context.logger, "Ping");
        reply(&context, Ok(Empty {}))
    }

    /// Report the health of the server subsystems.
    pub async fn system_status(&self, request: Request<Empty>) -> RpcResult<StatusReply> {
        let context = self.request_context("SystemStatus", &request);
        let status = self.health.run(&context).await;
        reply(&context, Ok(StatusReply::from(status)))
    }
}
