//! The [`Context`] is a general purpose immutable container to carry scoped values around.
//!
//! Code executed as part of NetAuth processes can access operation scoped values.
//!
//! Contexts are organised into a tree structure:
//!
//! - A root context represents the general process wide scope.
//! - Derived contexts represents a narrower scope within their parent with additional
//!   or updated information attached to them.
//!
//! For example: [`Context`]s provide access to the current [`Logger`].
//! For the root context this is the process-wide logger with no additional attributes.
//! But for individual operations a derived context can be provided with a [`Logger`] decorated
//! with the chain name, the entity being processed or other request attributes.
//!
//! ## Cancellation
//!
//! Every [`Context`] carries a [`CancellationToken`].
//! Storage and plugin calls check the token so that abandoned requests stop
//! as soon as they reach a suspension point.
//! Derived contexts use child tokens: cancelling a parent cancels all derived contexts
//! but cancelling a derived context leaves the parent untouched.
use slog::Logger;
use slog::OwnedKV;
use slog::SendSyncRefUnwindSafeKV;
use tokio_util::sync::CancellationToken;

/// The [`Context`] is a general purpose container to carry scoped values around.
///
/// Refer to the [crate level docs](crate) for details.
#[derive(Clone, Debug)]
pub struct Context {
    /// Token to signal the operation should be abandoned.
    pub cancel: CancellationToken,

    /// Logger with contextual attributes attached to it.
    pub logger: Logger,
}

impl Context {
    /// Wait for the context to be cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Derive a new [`Context`] by making changes to the current one.
    pub fn derive(&self) -> ContextBuilder {
        ContextBuilder {
            cancel: self.cancel.child_token(),
            logger: self.logger.clone(),
        }
    }

    /// Derive a new [`Context`] by making changes to the current one using the provided callback.
    pub fn derive_with<F>(&self, callback: F) -> Context
    where
        F: FnOnce(ContextBuilder) -> ContextBuilder,
    {
        let builder = callback(self.derive());
        builder.build()
    }

    /// Check if the operation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Initialise a new root context with no values attached.
    pub fn root(logger: Logger) -> ContextBuilder {
        ContextBuilder {
            cancel: CancellationToken::new(),
            logger,
        }
    }
}

/// A builder for root and derived contexts.
pub struct ContextBuilder {
    cancel: CancellationToken,
    logger: Logger,
}

impl ContextBuilder {
    /// Finalise the build process and return a new [`Context`].
    pub fn build(self) -> Context {
        Context {
            cancel: self.cancel,
            logger: self.logger,
        }
    }

    /// Replace the cancellation token of the context to build.
    ///
    /// Useful to tie operations to a token owned by the caller, such as a process shutdown.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Update the [`Context`] logger to attach new log key/pair values.
    pub fn log_values<T>(mut self, entries: OwnedKV<T>) -> Self
    where
        T: SendSyncRefUnwindSafeKV + 'static,
    {
        self.logger = self.logger.new(entries);
        self
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Context {
    /// Create an empty context useful for test.
    pub fn fixture() -> Context {
        let logger = Logger::root(slog::Discard, slog::o!());
        Context {
            cancel: CancellationToken::new(),
            logger,
        }
    }
}
