//! The NetAuth tree of entities and groups.
//!
//! Every change to the tree is performed by a chain of hooks:
//!
//! - [`hook`] defines the hook interfaces and the registry of hook constructors.
//! - [`chain`] assembles hooks into named chains and executes them.
//! - [`hooks`] provides the hooks the default chains are made of.
//! - [`Manager`] is the public interface to the tree, translating operations into chains.
pub mod chain;
pub mod graph;
pub mod hook;
pub mod hooks;
mod manager;

pub use self::chain::ChainConfig;
pub use self::chain::Chains;
pub use self::hook::EntityHook;
pub use self::hook::GroupHook;
pub use self::hook::HookRegistryBuilder;
pub use self::hook::RefContext;
pub use self::manager::KeyMode;
pub use self::manager::Manager;
pub use self::manager::ManagerBuilder;
pub use self::manager::MetaMode;

/// Pseudo-group matching every entity when listing members.
pub const ALL_GROUP: &str = "ALL";
