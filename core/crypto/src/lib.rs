//! One-way transformation of entity secrets.
//!
//! The tree never inspects stored secrets: it asks a [`Crypto`] provider to secure
//! plain text secrets before they are stored and to verify plain text secrets
//! against the stored value.
//! Providers are selected at process start by name through their [`CryptoFactory`].
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value as Json;

use netauth_context::Context;
use netauth_errors::Error;

mod argon;
mod nocrypto;

pub use self::argon::Argon2Crypto;
pub use self::argon::Argon2Factory;
pub use self::argon::Conf as Argon2Conf;
pub use self::nocrypto::NoCrypto;
pub use self::nocrypto::NoCryptoFactory;

/// Secure and verify entity secrets.
#[derive(Clone)]
pub struct Crypto {
    inner: Arc<dyn CryptoBackend>,
}

impl Crypto {
    /// Transform a plain text secret into the value to store.
    pub async fn secure_secret(&self, context: &Context, secret: &str) -> Result<String> {
        if context.is_cancelled() {
            anyhow::bail!(Error::Cancelled);
        }
        self.inner.secure_secret(context, secret).await
    }

    /// Check a plain text secret against a stored value.
    ///
    /// Mismatches fail with [`Error::AuthorizationFailure`].
    pub async fn verify_secret(&self, context: &Context, secret: &str, stored: &str) -> Result<()> {
        if context.is_cancelled() {
            anyhow::bail!(Error::Cancelled);
        }
        self.inner.verify_secret(context, secret, stored).await
    }
}

impl<T> From<T> for Crypto
where
    T: CryptoBackend + 'static,
{
    fn from(value: T) -> Self {
        Crypto {
            inner: Arc::new(value),
        }
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Crypto {
    /// Pass-through provider for unit tests.
    pub fn fixture() -> Self {
        Crypto::from(NoCrypto)
    }
}

/// Operations implemented by secret hashing providers.
#[async_trait::async_trait]
pub trait CryptoBackend: Send + Sync {
    /// Transform a plain text secret into the value to store.
    async fn secure_secret(&self, context: &Context, secret: &str) -> Result<String>;

    /// Check a plain text secret against a stored value.
    async fn verify_secret(&self, context: &Context, secret: &str, stored: &str) -> Result<()>;
}

/// Initialisation logic for a [`CryptoBackend`].
pub trait CryptoFactory: Send + Sync {
    /// Validate the user provided configuration for the provider.
    fn conf_check(&self, context: &Context, conf: &Json) -> Result<()>;

    /// Instantiate a [`Crypto`] object to secure and verify secrets.
    fn crypto(&self, context: &Context, conf: &Json) -> Result<Crypto>;
}
