//! Unsigned tokens for development and testing only.
use std::time::Duration;

use anyhow::Result;
use serde_json::Value as Json;

use netauth_context::Context;

use crate::Claims;
use crate::TokenBackend;
use crate::TokenFactory;
use crate::TokenService;

/// Issue tokens anyone can forge.
pub struct InsecureTokens;

impl TokenBackend for InsecureTokens {
    fn generate(&self, claims: &Claims) -> Result<String> {
        claims.encode()
    }

    fn validate(&self, token: &str) -> Result<Claims> {
        Claims::decode(token)
    }
}

/// Initialise the insecure token backend.
pub struct InsecureFactory;

impl TokenFactory for InsecureFactory {
    fn conf_check(&self, _: &Context, _: &Json) -> Result<()> {
        Ok(())
    }

    fn service(&self, context: &Context, _: &Json, lifetime: Duration) -> Result<TokenService> {
        slog::warn!(context.logger, "Using the insecure token backend, tokens are NOT signed");
        Ok(TokenService::new(InsecureTokens, lifetime))
    }
}
