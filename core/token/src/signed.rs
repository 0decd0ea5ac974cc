//! Tokens signed with HMAC-SHA256 over a shared key.
//!
//! A token is the URL safe base64 encoding of the JSON claims followed by a `.`
//! and the encoded signature of the claims' encoding.
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as AnyContext;
use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::Hmac;
use hmac::Mac;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as Json;
use sha2::Sha256;

use netauth_context::Context;
use netauth_errors::Error;

use crate::Claims;
use crate::TokenBackend;
use crate::TokenFactory;
use crate::TokenService;

type HmacSha256 = Hmac<Sha256>;

/// Signing key configuration.
///
/// Exactly one of `key` or `key_file` must be set.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Conf {
    /// Signing key, inline.
    #[serde(default)]
    pub key: Option<String>,

    /// Path to a file holding the signing key.
    #[serde(default, rename = "key-file")]
    pub key_file: Option<PathBuf>,
}

/// The HMAC token backend configuration is not valid.
#[derive(Debug, thiserror::Error)]
pub enum ConfError {
    #[error("the HMAC token backend needs exactly one of key or key-file")]
    KeySource,

    #[error("the HMAC token signing key is empty")]
    EmptyKey,

    #[error("unable to read the HMAC token signing key from '{0}'")]
    KeyFile(String),

    #[error("the HMAC token backend configuration is not valid")]
    Decode,
}

/// Sign tokens with a shared key.
pub struct HmacTokens {
    key: Vec<u8>,
}

impl HmacTokens {
    pub fn new<K>(key: K) -> Result<HmacTokens>
    where
        K: Into<Vec<u8>>,
    {
        let key = key.into();
        if key.is_empty() {
            anyhow::bail!(ConfError::EmptyKey);
        }
        Ok(HmacTokens { key })
    }

    /// Load the signing key as described by the configuration.
    pub fn from_conf(conf: &Conf) -> Result<HmacTokens> {
        match (&conf.key, &conf.key_file) {
            (Some(key), None) => HmacTokens::new(key.as_bytes()),
            (None, Some(path)) => {
                let key = std::fs::read(path)
                    .with_context(|| ConfError::KeyFile(path.display().to_string()))?;
                // Key files usually end with a new line that is not part of the key.
                let end = key
                    .iter()
                    .rposition(|byte| !byte.is_ascii_whitespace())
                    .map(|index| index + 1)
                    .unwrap_or(0);
                HmacTokens::new(&key[..end])
            }
            _ => anyhow::bail!(ConfError::KeySource),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.key).context(Error::internal("invalid HMAC key"))
    }
}

impl TokenBackend for HmacTokens {
    fn generate(&self, claims: &Claims) -> Result<String> {
        let payload = claims.encode()?;
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    fn validate(&self, token: &str) -> Result<Claims> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| Error::Unauthenticated("malformed token".into()))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| Error::Unauthenticated("malformed token".into()))?;
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::Unauthenticated("invalid token signature".into()))?;
        Claims::decode(payload)
    }
}

/// Initialise the HMAC token backend.
pub struct HmacFactory;

impl TokenFactory for HmacFactory {
    fn conf_check(&self, _: &Context, conf: &Json) -> Result<()> {
        let conf = parse_conf(conf)?;
        HmacTokens::from_conf(&conf)?;
        Ok(())
    }

    fn service(&self, context: &Context, conf: &Json, lifetime: Duration) -> Result<TokenService> {
        let conf = parse_conf(conf)?;
        let tokens = HmacTokens::from_conf(&conf)?;
        slog::debug!(context.logger, "HMAC token backend initialised");
        Ok(TokenService::new(tokens, lifetime))
    }
}

fn parse_conf(conf: &Json) -> Result<Conf> {
    let conf = serde_json::from_value(conf.clone()).context(ConfError::Decode)?;
    Ok(conf)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use serde_json::json;

    use netauth_context::Context;
    use netauth_errors::Error;
    use netauth_models::Capability;

    use super::ConfError;
    use super::HmacFactory;
    use super::HmacTokens;
    use crate::TokenFactory;
    use crate::TokenService;

    fn service(key: &str) -> TokenService {
        let tokens = HmacTokens::new(key.as_bytes()).unwrap();
        TokenService::new(tokens, Duration::from_secs(60))
    }

    #[test]
    fn signed_tokens_validate() {
        let context = Context::fixture();
        let service = service("k3y");
        let token = service
            .issue(&context, "alice", vec![Capability::ModifyEntityMeta])
            .unwrap();
        assert_eq!(token.split('.').count(), 2);
        let claims = service.validate(&context, &token).unwrap();
        assert_eq!(claims.entity_id, "alice");
        assert_eq!(claims.capabilities, vec![Capability::ModifyEntityMeta]);
    }

    #[test]
    fn other_keys_rejected() {
        let context = Context::fixture();
        let token = service("k3y").issue(&context, "alice", Vec::new()).unwrap();
        let error = service("other").validate(&context, &token).unwrap_err();
        assert_eq!(
            Error::find(&error),
            Some(&Error::Unauthenticated("invalid token signature".into()))
        );
    }

    #[test]
    fn tampered_claims_rejected() {
        let context = Context::fixture();
        let service = service("k3y");
        let token = service.issue(&context, "alice", Vec::new()).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged = TokenService::fixture()
            .issue(&context, "alice", vec![Capability::GlobalRoot])
            .unwrap();
        let forged = format!("{}.{}", forged, signature);
        let error = service.validate(&context, &forged).unwrap_err();
        assert!(Error::Unauthenticated(String::new()).is_kind(&error));
    }

    #[test]
    fn unsigned_tokens_rejected() {
        let context = Context::fixture();
        let token = TokenService::fixture()
            .issue(&context, "alice", Vec::new())
            .unwrap();
        let error = service("k3y").validate(&context, &token).unwrap_err();
        assert!(Error::Unauthenticated(String::new()).is_kind(&error));
    }

    #[test]
    fn key_from_file() {
        let context = Context::fixture();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "k3y").unwrap();
        let conf = json!({"key-file": file.path()});
        let service = HmacFactory
            .service(&context, &conf, Duration::from_secs(60))
            .unwrap();
        let token = service.issue(&context, "alice", Vec::new()).unwrap();

        // The trailing new line is not part of the key.
        self::service("k3y").validate(&context, &token).unwrap();
    }

    #[test]
    fn conf_needs_one_key() {
        let context = Context::fixture();
        let error = HmacFactory.conf_check(&context, &json!({})).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ConfError>(),
            Some(ConfError::KeySource)
        ));
        let error = HmacFactory
            .conf_check(&context, &json!({"key": ""}))
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ConfError>(),
            Some(ConfError::EmptyKey)
        ));
        HmacFactory
            .conf_check(&context, &json!({"key": "k3y"}))
            .unwrap();
    }
}
