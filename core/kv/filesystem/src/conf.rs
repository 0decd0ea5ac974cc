//! Configuration for the filesystem KV backend.
use serde::Deserialize;
use serde::Serialize;

/// Filesystem specific configuration for the KV interface.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// Directory records are stored in.
    pub home: String,

    /// Poll the data directories and emit events for records changed by other processes.
    #[serde(default)]
    pub watcher: bool,

    /// Seconds between polls of the data directories.
    #[serde(default = "Conf::default_watch_interval", rename = "watch-interval")]
    pub watch_interval: u64,
}

impl Conf {
    fn default_watch_interval() -> u64 {
        1
    }
}

/// The filesystem KV backend configuration is not valid.
#[derive(Debug, thiserror::Error)]
#[error("the filesystem KV backend configuration is not valid")]
pub struct ConfError;
