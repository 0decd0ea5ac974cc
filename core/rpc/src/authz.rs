//! Authorization of requests from the caller's bearer token.
use anyhow::Result;
use tonic::metadata::MetadataMap;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_models::Capability;
use netauth_token::Claims;

use crate::NetAuthService;

/// Metadata key carrying the bearer token.
pub const AUTHORIZATION: &str = "authorization";

/// Extract the bearer token from request metadata, with or without a `Bearer ` prefix.
pub fn bearer_token(metadata: &MetadataMap) -> Option<&str> {
    let value = crate::metadata_str(metadata, AUTHORIZATION)?.trim();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

impl NetAuthService {
    /// Validate the token attached to the request.
    pub(crate) fn caller(&self, context: &Context, metadata: &MetadataMap) -> Result<Claims> {
        let token = match bearer_token(metadata) {
            Some(token) => token,
            None => anyhow::bail!(Error::Unauthenticated("no token provided".into())),
        };
        self.tokens.validate(context, token)
    }

    /// Validate the token attached to the request and check it grants `capability`.
    pub(crate) fn require(
        &self,
        context: &Context,
        metadata: &MetadataMap,
        capability: Capability,
    ) -> Result<Claims> {
        let claims = self.caller(context, metadata)?;
        if !claims.has_capability(capability) {
            slog::info!(
                context.logger, "Request denied";
                "requestor" => &claims.entity_id,
                "capability" => capability.as_str(),
            );
            anyhow::bail!(Error::RequestorUnqualified(capability.to_string()));
        }
        Ok(claims)
    }

    /// Check the caller may change the direct members of a group.
    ///
    /// Callers need `MODIFY_GROUP_MEMBERS` unless they are effective members of the
    /// group managing the target group.
    pub(crate) async fn require_member_manager(
        &self,
        context: &Context,
        metadata: &MetadataMap,
        group: &str,
    ) -> Result<Claims> {
        let claims = self.caller(context, metadata)?;
        if claims.has_capability(Capability::ModifyGroupMembers) {
            return Ok(claims);
        }

        let denied = || Error::RequestorUnqualified(Capability::ModifyGroupMembers.to_string());
        let group = self.manager.db().load_group(context, group).await?;
        let managed_by = match group.managed_by.as_deref() {
            Some(managed_by) if !managed_by.is_empty() => managed_by,
            _ => anyhow::bail!(denied()),
        };
        let requestor = self.manager.db().load_entity(context, &claims.entity_id).await?;
        let memberships = self
            .manager
            .get_memberships(context, &requestor, true)
            .await?;
        if !memberships.iter().any(|name| name == managed_by) {
            anyhow::bail!(denied());
        }
        slog::debug!(
            context.logger, "Membership change delegated to managing group";
            "requestor" => &claims.entity_id,
            "group" => &group.name,
            "managed_by" => managed_by,
        );
        Ok(claims)
    }

    /// Capabilities held by an entity directly and through its effective groups.
    pub(crate) async fn effective_capabilities(
        &self,
        context: &Context,
        id: &str,
    ) -> Result<Vec<Capability>> {
        let entity = self.manager.fetch_entity(context, id).await?;
        let mut capabilities = entity
            .meta
            .as_ref()
            .map(|meta| meta.capability_set())
            .unwrap_or_default();
        for name in self.manager.get_memberships(context, &entity, true).await? {
            let group = self.manager.db().load_group(context, &name).await?;
            capabilities.extend(group.capability_set());
        }
        capabilities.sort();
        capabilities.dedup();
        Ok(capabilities)
    }
}
