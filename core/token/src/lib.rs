//! Bearer tokens issued to authenticated entities.
//!
//! Tokens are not stored by the server: they carry the ID of the entity they were
//! issued to and the capabilities it held at the time, along with an expiry.
//! Token encoding and signing is performed by a [`TokenBackend`], selected at
//! process start by name through its [`TokenFactory`].
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as Json;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_models::Capability;

mod insecure;
mod signed;

pub use self::insecure::InsecureFactory;
pub use self::insecure::InsecureTokens;
pub use self::signed::Conf as HmacConf;
pub use self::signed::ConfError as HmacConfError;
pub use self::signed::HmacFactory;
pub use self::signed::HmacTokens;

/// Default validity of issued tokens.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(600);

/// Information carried by a token.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// ID of the entity the token was issued to.
    pub entity_id: String,

    /// Effective capabilities of the entity when the token was issued.
    pub capabilities: Vec<Capability>,

    /// Issue time, in seconds since the UNIX epoch.
    pub issued_at: i64,

    /// Expiry time, in seconds since the UNIX epoch.
    pub expires_at: i64,
}

impl Claims {
    /// Check if the claims grant a capability satisfying `required`.
    pub fn has_capability(&self, required: Capability) -> bool {
        self.capabilities
            .iter()
            .any(|capability| capability.satisfies(required))
    }

    fn encode(&self) -> Result<String> {
        let payload = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(payload))
    }

    fn decode(payload: &str) -> Result<Claims> {
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| Error::Unauthenticated("malformed token".into()))?;
        let claims = serde_json::from_slice(&payload)
            .map_err(|_| Error::Unauthenticated("malformed token".into()))?;
        Ok(claims)
    }
}

/// Issue and validate tokens.
#[derive(Clone)]
pub struct TokenService {
    backend: Arc<dyn TokenBackend>,
    lifetime: Duration,
}

impl TokenService {
    pub fn new<B>(backend: B, lifetime: Duration) -> TokenService
    where
        B: TokenBackend + 'static,
    {
        TokenService {
            backend: Arc::new(backend),
            lifetime,
        }
    }

    /// Issue a token for an entity with the given effective capabilities.
    pub fn issue(
        &self,
        context: &Context,
        entity_id: &str,
        capabilities: Vec<Capability>,
    ) -> Result<String> {
        let issued_at = now();
        let lifetime = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            entity_id: entity_id.to_string(),
            capabilities,
            issued_at,
            expires_at: issued_at.saturating_add(lifetime),
        };
        slog::debug!(
            context.logger, "Issuing token";
            "entity" => entity_id,
            "expires_at" => claims.expires_at,
        );
        self.backend.generate(&claims)
    }

    /// Decode a token and check it is authentic and not expired.
    ///
    /// Invalid tokens fail with [`Error::Unauthenticated`].
    pub fn validate(&self, _: &Context, token: &str) -> Result<Claims> {
        let claims = self.backend.validate(token)?;
        if claims.expires_at <= now() {
            anyhow::bail!(Error::Unauthenticated("token expired".into()));
        }
        Ok(claims)
    }

    /// Validity of issued tokens.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl TokenService {
    /// Unsigned tokens for unit tests.
    pub fn fixture() -> TokenService {
        TokenService::new(InsecureTokens, DEFAULT_LIFETIME)
    }
}

/// Encoding and signing of token claims.
pub trait TokenBackend: Send + Sync {
    /// Encode claims into a token.
    fn generate(&self, claims: &Claims) -> Result<String>;

    /// Decode a token into its claims, verifying any signature.
    ///
    /// Expiry is checked by the [`TokenService`].
    fn validate(&self, token: &str) -> Result<Claims>;
}

/// Initialisation logic for a [`TokenBackend`].
pub trait TokenFactory: Send + Sync {
    /// Validate the user provided configuration for the backend.
    fn conf_check(&self, context: &Context, conf: &Json) -> Result<()>;

    /// Instantiate a [`TokenService`] issuing tokens valid for `lifetime`.
    fn service(&self, context: &Context, conf: &Json, lifetime: Duration) -> Result<TokenService>;
}

fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
