//! Authentication and token methods.
use anyhow::Result;
use tonic::Request;

use netauth_errors::Error;
use netauth_models::Capability;

use crate::messages::AuthRequest;
use crate::messages::ChangeSecretRequest;
use crate::messages::Empty;
use crate::messages::TokenReply;
use crate::messages::ValidateTokenRequest;
use crate::reply;
use crate::NetAuthService;
use crate::RpcResult;

impl NetAuthService {
    /// Check the secret of an entity.
    pub async fn auth_entity(&self, request: Request<AuthRequest>) -> RpcResult<Empty> {
        let context = self.request_context("AuthEntity", &request);
        let request = request.into_inner();
        let result = self
            .manager
            .validate_secret(&context, &request.id, &request.secret)
            .await
            .map(|_| Empty {});
        reply(&context, result)
    }

    /// Check the secret of an entity and issue a token for it.
    pub async fn auth_get_token(&self, request: Request<AuthRequest>) -> RpcResult<TokenReply> {
        let context = self.request_context("AuthGetToken", &request);
        let request = request.into_inner();
        let result: Result<TokenReply> = async {
            self.manager
                .validate_secret(&context, &request.id, &request.secret)
                .await?;
            let capabilities = self.effective_capabilities(&context, &request.id).await?;
            let token = self.tokens.issue(&context, &request.id, capabilities)?;
            Ok(TokenReply { token })
        }
        .await;
        reply(&context, result)
    }

    /// Check a token is valid.
    pub async fn auth_validate_token(
        &self,
        request: Request<ValidateTokenRequest>,
    ) -> RpcResult<Empty> {
        let context = self.request_context("AuthValidateToken", &request);
        let request = request.into_inner();
        let result = self
            .tokens
            .validate(&context, &request.token)
            .map(|_| Empty {});
        reply(&context, result)
    }

    /// Change the secret of an entity.
    ///
    /// Entities can change their own secret by presenting the current one,
    /// any other change requires `CHANGE_ENTITY_SECRET`.
    pub async fn auth_change_secret(
        &self,
        request: Request<ChangeSecretRequest>,
    ) -> RpcResult<Empty> {
        let context = self.request_context("AuthChangeSecret", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            if request.secret.is_empty() {
                anyhow::bail!(Error::MalformedRequest("a new secret is required".into()));
            }
            if request.current.is_empty() {
                self.require(&context, &metadata, Capability::ChangeEntitySecret)?;
            } else {
                self.manager
                    .validate_secret(&context, &request.id, &request.current)
                    .await?;
            }
            self.manager
                .set_entity_secret(&context, &request.id, &request.secret)
                .await?;
            slog::info!(context.logger, "Entity secret changed"; "entity" => &request.id);
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }
}
