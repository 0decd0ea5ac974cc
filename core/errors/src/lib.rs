//! Common errors from and for NetAuth implementation.
//!
//! All components report failures with [`anyhow::Error`]s.
//! When a failure has a meaning callers may want to react to, an [`Error`] is attached
//! to the chain, either as the root error or as context around a lower level failure.
//!
//! Use [`Error::find`] to recover the [`Error`] attached to an [`anyhow::Error`].

/// Unified set of errors reported by the NetAuth tree and its dependencies.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The token was valid but a required capability is missing.
    #[error("the requesting entity lacks the required '{0}' capability")]
    // (capability,)
    RequestorUnqualified(String),

    /// The provided secret did not match the stored secret.
    #[error("authorization failure")]
    AuthorizationFailure,

    /// The operation was cancelled before it could complete.
    #[error("the operation was cancelled")]
    Cancelled,

    /// An entity with the requested ID already exists.
    #[error("an entity with ID '{0}' already exists")]
    // (id,)
    DuplicateEntityID(String),

    /// A group with the requested name already exists.
    #[error("a group with name '{0}' already exists")]
    // (name,)
    DuplicateGroupName(String),

    /// The requested number is already in use.
    #[error("the number {0} is already in use")]
    // (number,)
    DuplicateNumber(i32),

    /// A hook chain was configured without any hooks.
    #[error("the hook chain '{0}' is empty")]
    // (chain,)
    EmptyHookChain(String),

    /// The entity is locked and can't be authenticated.
    #[error("the entity '{0}' is locked")]
    // (id,)
    EntityLocked(String),

    /// The expansion already exists or would create a cycle.
    #[error("the expansion '{0}' already exists or would create a cycle")]
    // (expansion,)
    ExistingExpansion(String),

    /// The request could not be satisfied in the current state.
    #[error("failed precondition: {0}")]
    // (reason,)
    FailedPrecondition(String),

    /// A hook with the given name is already registered.
    #[error("a hook named '{0}' is already registered")]
    // (name,)
    HookExists(String),

    /// An unexpected failure occurred while processing the request.
    #[error("internal error: {0}")]
    // (reason,)
    InternalError(String),

    /// The KV2 key already exists on the record.
    #[error("the key '{0}' already exists")]
    // (key,)
    KeyExists(String),

    /// The request is missing fields or has fields with invalid values.
    #[error("malformed request: {0}")]
    // (reason,)
    MalformedRequest(String),

    /// The search expression is empty or invalid.
    #[error("invalid search expression: {0}")]
    // (reason,)
    BadSearch(String),

    /// The KV2 key does not exist on the record.
    #[error("the key '{0}' does not exist")]
    // (key,)
    NoSuchKey(String),

    /// No value is stored at the requested key.
    #[error("no value stored for key '{0}'")]
    // (key,)
    NoValue(String),

    /// A tree plugin reported a failure.
    #[error("plugin '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },

    /// The storage backend does not allow changes.
    #[error("the storage backend is read only")]
    ReadOnly,

    /// The request did not carry a valid token.
    #[error("authentication required: {0}")]
    // (reason,)
    Unauthenticated(String),

    /// The capability is not known or was not provided.
    #[error("unknown capability '{0}'")]
    // (capability,)
    UnknownCapability(String),

    /// No crypto backend is registered with the given name.
    #[error("crypto backend '{0}' not recognised")]
    // (name,)
    UnknownCrypto(String),

    /// No storage backend is registered with the given name.
    #[error("database backend '{0}' not recognised")]
    // (name,)
    UnknownDatabase(String),

    /// No entity exists with the given ID.
    #[error("unknown entity '{0}'")]
    // (id,)
    UnknownEntity(String),

    /// No group exists with the given name.
    #[error("unknown group '{0}'")]
    // (name,)
    UnknownGroup(String),

    /// No hook is registered (or constructed) with the given name.
    #[error("unknown hook '{0}'")]
    // (name,)
    UnknownHook(String),

    /// No hook chain exists with the given name.
    #[error("unknown hook chain '{0}'")]
    // (name,)
    UnknownHookChain(String),

    /// No token backend is registered with the given name.
    #[error("token backend '{0}' not recognised")]
    // (name,)
    UnknownTokenBackend(String),
}

impl Error {
    /// Find the first [`Error`] attached to an [`anyhow::Error`] chain.
    ///
    /// Both the error itself and all its causes are inspected so errors attached with
    /// [`anyhow::Context::context`] are found as well as errors returned directly.
    pub fn find(error: &anyhow::Error) -> Option<&Error> {
        if let Some(found) = error.downcast_ref::<Error>() {
            return Some(found);
        }
        error.chain().find_map(|cause| cause.downcast_ref::<Error>())
    }

    /// Check if an [`anyhow::Error`] carries an [`Error`] of the same kind as `self`.
    ///
    /// Only the variant is compared, attached values are ignored.
    pub fn is_kind(&self, error: &anyhow::Error) -> bool {
        match Error::find(error) {
            None => false,
            Some(found) => std::mem::discriminant(found) == std::mem::discriminant(self),
        }
    }

    /// Shortcut to create an [`Error::InternalError`] from any message.
    pub fn internal<S: Into<String>>(reason: S) -> Self {
        Error::InternalError(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::Error;

    #[test]
    fn find_direct_error() {
        let error = anyhow::anyhow!(Error::UnknownEntity("alice".into()));
        let found = Error::find(&error);
        assert_eq!(found, Some(&Error::UnknownEntity("alice".into())));
    }

    #[test]
    fn find_context_error() {
        let error: anyhow::Result<()> = Err(anyhow::anyhow!("disk on fire"));
        let error = error
            .context(Error::internal("failed to save"))
            .unwrap_err();
        let found = Error::find(&error);
        assert_eq!(found, Some(&Error::InternalError("failed to save".into())));
    }

    #[test]
    fn find_nested_error() {
        let error = anyhow::anyhow!(Error::NoValue("/entities/bob".into()));
        let error = error.context("loading entity");
        let found = Error::find(&error);
        assert_eq!(found, Some(&Error::NoValue("/entities/bob".into())));
    }

    #[test]
    fn find_missing_error() {
        let error = anyhow::anyhow!("some other error");
        assert_eq!(Error::find(&error), None);
    }

    #[test]
    fn is_kind_ignores_values() {
        let error = anyhow::anyhow!(Error::KeyExists("phone".into()));
        assert!(Error::KeyExists(String::new()).is_kind(&error));
        assert!(!Error::NoSuchKey(String::new()).is_kind(&error));
    }
}
