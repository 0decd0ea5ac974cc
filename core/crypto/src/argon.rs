//! Secure secrets with Argon2id hashes in the PHC string format.
use anyhow::Context as AnyContext;
use anyhow::Result;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::Algorithm;
use argon2::Argon2;
use argon2::Params;
use argon2::Version;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as Json;

use netauth_context::Context;
use netauth_errors::Error;

use crate::Crypto;
use crate::CryptoBackend;
use crate::CryptoFactory;

/// Argon2id cost parameters.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// Memory cost in KiB.
    #[serde(default = "Conf::default_memory")]
    pub memory: u32,

    /// Number of iterations.
    #[serde(default = "Conf::default_iterations")]
    pub iterations: u32,

    /// Degree of parallelism.
    #[serde(default = "Conf::default_parallelism")]
    pub parallelism: u32,
}

impl Conf {
    fn default_iterations() -> u32 {
        Params::DEFAULT_T_COST
    }

    fn default_memory() -> u32 {
        Params::DEFAULT_M_COST
    }

    fn default_parallelism() -> u32 {
        Params::DEFAULT_P_COST
    }
}

impl Default for Conf {
    fn default() -> Self {
        Conf {
            memory: Conf::default_memory(),
            iterations: Conf::default_iterations(),
            parallelism: Conf::default_parallelism(),
        }
    }
}

/// The Argon2 crypto provider configuration is not valid.
#[derive(Debug, thiserror::Error)]
#[error("the Argon2 crypto provider configuration is not valid")]
pub struct ConfError;

/// Secure secrets with salted Argon2id hashes.
pub struct Argon2Crypto {
    hasher: Argon2<'static>,
}

impl Argon2Crypto {
    /// Create a provider with the given cost parameters.
    pub fn new(conf: &Conf) -> Result<Argon2Crypto> {
        let params = Params::new(conf.memory, conf.iterations, conf.parallelism, None)
            .map_err(|error| anyhow::anyhow!("invalid Argon2 parameters: {}", error))
            .context(ConfError)?;
        let hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Argon2Crypto { hasher })
    }
}

#[async_trait::async_trait]
impl CryptoBackend for Argon2Crypto {
    async fn secure_secret(&self, _: &Context, secret: &str) -> Result<String> {
        let hasher = self.hasher.clone();
        let secret = secret.to_string();
        let hashed = tokio::task::spawn_blocking(move || {
            let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
                .map_err(|error| anyhow::anyhow!("unable to generate salt: {}", error))?;
            let hash = hasher
                .hash_password(secret.as_bytes(), &salt)
                .map_err(|error| anyhow::anyhow!("unable to hash secret: {}", error))?;
            Ok::<_, anyhow::Error>(hash.to_string())
        })
        .await
        .context(Error::internal("secret hashing task failed"))?;
        hashed.context(Error::internal("unable to secure secret"))
    }

    async fn verify_secret(&self, _: &Context, secret: &str, stored: &str) -> Result<()> {
        let hasher = self.hasher.clone();
        let secret = secret.to_string();
        let stored = stored.to_string();
        let verified = tokio::task::spawn_blocking(move || {
            // Unparsable stored values can never be matched.
            let hash = match PasswordHash::new(&stored) {
                Ok(hash) => hash,
                Err(_) => return false,
            };
            hasher.verify_password(secret.as_bytes(), &hash).is_ok()
        })
        .await
        .context(Error::internal("secret verification task failed"))?;
        if !verified {
            anyhow::bail!(Error::AuthorizationFailure);
        }
        Ok(())
    }
}

/// Initialise the Argon2 crypto provider.
pub struct Argon2Factory;

impl CryptoFactory for Argon2Factory {
    fn conf_check(&self, _: &Context, conf: &Json) -> Result<()> {
        let conf = parse_conf(conf)?;
        Argon2Crypto::new(&conf)?;
        Ok(())
    }

    fn crypto(&self, _: &Context, conf: &Json) -> Result<Crypto> {
        let conf = parse_conf(conf)?;
        let crypto = Argon2Crypto::new(&conf)?;
        Ok(Crypto::from(crypto))
    }
}

fn parse_conf(conf: &Json) -> Result<Conf> {
    if conf.is_null() {
        return Ok(Conf::default());
    }
    let conf = serde_json::from_value(conf.clone()).context(ConfError)?;
    Ok(conf)
}
