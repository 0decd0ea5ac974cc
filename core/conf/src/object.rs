//! Data object storing the NetAuth server configuration.
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::LogConf;

/// Global configuration for the NetAuth server process.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// Storage, listener and provider selection.
    #[serde(default)]
    pub core: CoreConf,

    /// Options for the selected crypto provider.
    #[serde(default)]
    pub crypto: serde_json::Value,

    /// Event delivery between storage and the search index.
    #[serde(default)]
    pub events: EventsConf,

    /// Process logging configuration.
    #[serde(default)]
    pub log: LogConf,

    /// Options for the filesystem storage backend.
    #[serde(default)]
    pub pdb: PdbConf,

    /// Tree plugins discovery.
    #[serde(default)]
    pub plugin: PluginConf,

    /// Options for the Redis storage backend.
    #[serde(default)]
    pub redis: RedisConf,

    /// Server startup options.
    #[serde(default)]
    pub server: ServerConf,

    /// TLS material for the RPC listener.
    #[serde(default)]
    pub tls: TlsConf,

    /// Token service wiring.
    #[serde(default)]
    pub token: TokenConf,
}

impl Conf {
    /// Directory the filesystem storage backend keeps records in.
    pub fn data_dir(&self) -> PathBuf {
        self.core.home.join("pdb")
    }

    /// Directory scanned for tree plugins.
    pub fn plugin_dir(&self) -> PathBuf {
        self.plugin
            .path
            .clone()
            .unwrap_or_else(|| self.core.home.join("plugins"))
    }

    /// File the token signing key is read from with the `fs` key provider.
    pub fn token_key_file(&self) -> PathBuf {
        self.token
            .key_file
            .clone()
            .unwrap_or_else(|| self.core.home.join("keys").join("token.key"))
    }
}

/// Storage, listener and provider selection.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoreConf {
    /// Address the RPC listener binds to.
    #[serde(default = "CoreConf::default_bindaddr")]
    pub bindaddr: String,

    /// Name of the crypto provider that secures secrets.
    #[serde(default = "CoreConf::default_crypto")]
    pub crypto: String,

    /// Name of the KV backend records are stored in.
    #[serde(default = "CoreConf::default_db")]
    pub db: String,

    /// Root directory for on-disk state.
    #[serde(default = "CoreConf::default_home")]
    pub home: PathBuf,

    /// Port the RPC listener binds to.
    #[serde(default = "CoreConf::default_port")]
    pub port: u16,
}

impl CoreConf {
    fn default_bindaddr() -> String {
        "localhost".into()
    }

    fn default_crypto() -> String {
        "argon2".into()
    }

    fn default_db() -> String {
        "filesystem".into()
    }

    fn default_home() -> PathBuf {
        PathBuf::from("/var/lib/netauth")
    }

    fn default_port() -> u16 {
        1729
    }
}

impl Default for CoreConf {
    fn default() -> Self {
        CoreConf {
            bindaddr: CoreConf::default_bindaddr(),
            crypto: CoreConf::default_crypto(),
            db: CoreConf::default_db(),
            home: CoreConf::default_home(),
            port: CoreConf::default_port(),
        }
    }
}

/// Event delivery between storage and the search index.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EventsConf {
    /// Events queued between storage and the index, 0 for synchronous delivery.
    #[serde(default)]
    pub buffer: usize,
}

/// Options for the filesystem storage backend.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PdbConf {
    /// Emit events for records changed on disk by other processes.
    #[serde(default)]
    pub watcher: bool,

    /// Seconds between scans of the data directories.
    #[serde(default = "PdbConf::default_watch_interval", rename = "watch-interval")]
    pub watch_interval: u64,
}

impl PdbConf {
    fn default_watch_interval() -> u64 {
        1
    }
}

impl Default for PdbConf {
    fn default() -> Self {
        PdbConf {
            watcher: false,
            watch_interval: PdbConf::default_watch_interval(),
        }
    }
}

/// Tree plugins discovery.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PluginConf {
    /// Load only the plugins in `list` instead of scanning `path`.
    #[serde(default)]
    pub loadstatic: bool,

    /// Plugins to load when `loadstatic` is set.
    #[serde(default)]
    pub list: Vec<PathBuf>,

    /// Directory scanned for plugins, defaults to `<core.home>/plugins`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Seconds plugins have to answer each call.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Options for the Redis storage backend.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RedisConf {
    /// Prefix added to every stored key.
    #[serde(default)]
    pub prefix: String,

    /// URL of the Redis server.
    #[serde(default)]
    pub url: Option<String>,
}

/// Server startup options.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServerConf {
    /// Create or repair a root entity at startup, in the `id:secret` form.
    #[serde(default)]
    pub bootstrap: Option<String>,
}

impl ServerConf {
    /// Split the bootstrap option into its ID and secret.
    ///
    /// Returns `None` when bootstrap is not requested or the option is malformed.
    pub fn bootstrap_credentials(&self) -> Option<(&str, &str)> {
        let bootstrap = self.bootstrap.as_deref()?;
        let (id, secret) = bootstrap.split_once(':')?;
        if id.is_empty() || secret.is_empty() {
            return None;
        }
        Some((id, secret))
    }
}

/// TLS material for the RPC listener.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TlsConf {
    /// Path to the PEM encoded server certificate.
    #[serde(default)]
    pub certificate: Option<PathBuf>,

    /// Path to the PEM encoded server private key.
    #[serde(default)]
    pub key: Option<PathBuf>,

    /// Serve RPCs without TLS.
    #[serde(default)]
    pub pwn_me: bool,
}

/// Source of the token signing key.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyProvider {
    /// Read the key from a file.
    #[default]
    Fs,

    /// Use the key set in the configuration.
    Inline,
}

/// Token service wiring.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TokenConf {
    /// Name of the token backend.
    #[serde(default = "TokenConf::default_backend")]
    pub backend: String,

    /// Signing key, used with the `inline` key provider.
    #[serde(default)]
    pub key: Option<String>,

    /// Signing key file, defaults to `<core.home>/keys/token.key`.
    #[serde(default, rename = "key-file")]
    pub key_file: Option<PathBuf>,

    /// Source of the signing key.
    #[serde(default)]
    pub keyprovider: KeyProvider,

    /// Seconds issued tokens are valid for.
    #[serde(default = "TokenConf::default_lifetime")]
    pub lifetime: u64,
}

impl TokenConf {
    fn default_backend() -> String {
        "hmac".into()
    }

    fn default_lifetime() -> u64 {
        600
    }
}

impl Default for TokenConf {
    fn default() -> Self {
        TokenConf {
            backend: TokenConf::default_backend(),
            key: None,
            key_file: None,
            keyprovider: KeyProvider::default(),
            lifetime: TokenConf::default_lifetime(),
        }
    }
}
