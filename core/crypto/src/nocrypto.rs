//! Pass-through provider storing secrets in plain text.
//!
//! Only useful for tests and local experiments.
use anyhow::Result;
use serde_json::Value as Json;

use netauth_context::Context;
use netauth_errors::Error;

use crate::Crypto;
use crate::CryptoBackend;
use crate::CryptoFactory;

/// Store secrets unchanged and compare them for equality.
pub struct NoCrypto;

#[async_trait::async_trait]
impl CryptoBackend for NoCrypto {
    async fn secure_secret(&self, _: &Context, secret: &str) -> Result<String> {
        Ok(secret.to_string())
    }

    async fn verify_secret(&self, _: &Context, secret: &str, stored: &str) -> Result<()> {
        if secret != stored {
            anyhow::bail!(Error::AuthorizationFailure);
        }
        Ok(())
    }
}

/// Initialise the pass-through provider.
pub struct NoCryptoFactory;

impl CryptoFactory for NoCryptoFactory {
    fn conf_check(&self, _: &Context, _: &Json) -> Result<()> {
        Ok(())
    }

    fn crypto(&self, context: &Context, _: &Json) -> Result<Crypto> {
        slog::warn!(context.logger, "Secrets are stored in plain text");
        Ok(Crypto::from(NoCrypto))
    }
}

#[cfg(test)]
mod tests {
    use netauth_context::Context;
    use netauth_errors::Error;

    use crate::Crypto;

    #[tokio::test]
    async fn verify_equal_secrets() {
        let context = Context::fixture();
        let crypto = Crypto::fixture();
        let stored = crypto.secure_secret(&context, "s3cr3t").await.unwrap();
        crypto
            .verify_secret(&context, "s3cr3t", &stored)
            .await
            .unwrap();
        let error = crypto
            .verify_secret(&context, "wrong", &stored)
            .await
            .unwrap_err();
        assert_eq!(Error::find(&error), Some(&Error::AuthorizationFailure));
    }
}
