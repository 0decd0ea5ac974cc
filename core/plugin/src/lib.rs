//! Tree plugins extend the hook chains with logic running in separate processes.
//!
//! The [`PluginManager`] discovers plugin binaries at startup, performs the handshake
//! and keeps a [`PluginHandle`] for each plugin that loaded successfully.
//! Hook chains invoke plugins through the manager for each [`Action`].
//!
//! Plugin binaries are implemented with the [`sdk`] module.
mod action;
mod handle;
mod manager;
pub mod protocol;
pub mod sdk;

pub use self::action::Action;
pub use self::handle::HandshakeError;
pub use self::handle::CALL_TIMEOUT;
pub use self::handle::LocalPlugin;
pub use self::handle::PluginHandle;
pub use self::handle::ProcessHandle;
pub use self::manager::DiscoveryOpts;
pub use self::manager::PluginManager;
pub use self::manager::PLUGIN_EXTENSION;
pub use self::sdk::Plugin;
