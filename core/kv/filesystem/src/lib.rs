//! KV backend storing each record in its own file on local disk.
//!
//! Records are stored under a home directory with one sub-directory per record kind:
//!
//! ```text
//! <home>/
//!   entities/<ID>.dat
//!   groups/<Name>.dat
//! ```
//!
//! Writes are atomic: values are written to a hidden temporary file in the same directory
//! and renamed over the record file.
//! The home and data directories are created with `drwxr-x---` permissions and the backend
//! reports itself unhealthy when that is no longer the case.
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context as AnyContext;
use anyhow::Result;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_events::EventBus;
use netauth_kv::keys;
use netauth_kv::EventEmitter;
use netauth_kv::KvBackend;
use netauth_kv::KvCapability;

mod conf;
mod factory;
mod watcher;

#[cfg(test)]
mod tests;

pub use self::conf::Conf;
pub use self::conf::ConfError;
pub use self::factory::FilesystemFactory;

/// Permissions required on data directories.
pub const DIR_MODE: u32 = 0o750;

/// Extension of record files.
pub const RECORD_EXTENSION: &str = "dat";

const CAPABILITIES: &[KvCapability] = &[KvCapability::Mutable, KvCapability::EmitsEvents];

/// Data directories and the key prefix of records stored in them.
const SPACES: [(&str, &str); 2] = [
    ("entities", keys::ENTITIES_PREFIX),
    ("groups", keys::GROUPS_PREFIX),
];

/// Store records as individual files on disk.
pub struct FilesystemKv {
    context: Context,
    shared: Arc<Shared>,
}

/// The home directory followed by the directory of each record kind.
fn data_dirs(home: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    let spaces = SPACES.into_iter().map(move |(dir, _)| home.join(dir));
    std::iter::once(home.to_path_buf()).chain(spaces)
}

impl FilesystemKv {
    /// Open (creating if needed) the data directories under `home`.
    pub fn open<P: Into<PathBuf>>(context: &Context, home: P) -> Result<FilesystemKv> {
        let home = home.into();
        for path in data_dirs(&home) {
            std::fs::create_dir_all(&path)
                .with_context(|| Error::internal(format!("unable to create {}", path.display())))?;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(DIR_MODE))
                .with_context(|| {
                    Error::internal(format!("unable to set permissions on {}", path.display()))
                })?;
        }
        let shared = Shared {
            emitter: EventEmitter::default(),
            home,
            sequence: AtomicU64::new(0),
        };
        let context = context
            .derive()
            .log_values(slog::o!("kv" => "filesystem"))
            .build();
        Ok(FilesystemKv {
            context,
            shared: Arc::new(shared),
        })
    }

    /// Start polling the data directories for changes made by other processes.
    ///
    /// The watcher stops when the backend is closed.
    pub fn watch(&self, interval: std::time::Duration) {
        let context = self.context.clone();
        let shared = Arc::clone(&self.shared);
        tokio::spawn(self::watcher::run(context, shared, interval));
    }
}

#[async_trait::async_trait]
impl KvBackend for FilesystemKv {
    fn capabilities(&self) -> &'static [KvCapability] {
        CAPABILITIES
    }

    async fn close(&self, _: &Context) -> Result<()> {
        self.context.cancel.cancel();
        Ok(())
    }

    async fn del(&self, context: &Context, key: &str) -> Result<()> {
        let path = self.shared.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => (),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(error) => {
                let error = anyhow::Error::from(error);
                let reason = format!("unable to delete {}", path.display());
                return Err(error.context(Error::internal(reason)));
            }
        }
        self.shared.emitter.emit(context, key, true).await;
        Ok(())
    }

    async fn get(&self, _: &Context, key: &str) -> Result<Vec<u8>> {
        let path = self.shared.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(value) => Ok(value),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                anyhow::bail!(Error::NoValue(key.to_string()))
            }
            Err(error) => {
                let error = anyhow::Error::from(error);
                let reason = format!("unable to read {}", path.display());
                Err(error.context(Error::internal(reason)))
            }
        }
    }

    async fn health(&self, _: &Context) -> Result<()> {
        for path in data_dirs(&self.shared.home) {
            let meta = tokio::fs::metadata(&path)
                .await
                .with_context(|| Error::internal(format!("unable to stat {}", path.display())))?;
            let mode = meta.permissions().mode() & 0o777;
            if mode != DIR_MODE {
                anyhow::bail!(Error::FailedPrecondition(format!(
                    "directory {} has mode {:o} instead of {:o}",
                    path.display(),
                    mode,
                    DIR_MODE,
                )));
            }
        }
        self.shared.scan().await?;
        Ok(())
    }

    async fn keys(&self, _: &Context, pattern: &glob::Pattern) -> Result<Vec<String>> {
        let keys = self
            .shared
            .scan()
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| pattern.matches(key))
            .collect();
        Ok(keys)
    }

    async fn put(&self, context: &Context, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.shared.path_for(key)?;
        let temp = self.shared.temp_path(&path);
        tokio::fs::write(&temp, value)
            .await
            .with_context(|| Error::internal(format!("unable to write {}", temp.display())))?;
        if let Err(error) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            let error = anyhow::Error::from(error);
            let reason = format!("unable to replace {}", path.display());
            return Err(error.context(Error::internal(reason)));
        }
        self.shared.emitter.emit(context, key, false).await;
        Ok(())
    }

    fn set_events(&self, events: EventBus) {
        self.shared.emitter.install(events)
    }
}

/// State shared between the backend and its watcher.
pub(crate) struct Shared {
    pub(crate) emitter: EventEmitter,
    home: PathBuf,
    sequence: AtomicU64,
}

impl Shared {
    /// Path of the file storing the record at `key`.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        for (dir, prefix) in SPACES {
            let pk = match key.strip_prefix(prefix) {
                None => continue,
                Some(pk) => pk,
            };
            if pk.is_empty() || pk.contains('/') || pk.starts_with('.') {
                let reason = format!("'{}' can't be stored on the filesystem", pk);
                anyhow::bail!(Error::MalformedRequest(reason));
            }
            let file = format!("{}.{}", pk, RECORD_EXTENSION);
            return Ok(self.home.join(dir).join(file));
        }
        let reason = format!("key '{}' is outside the record key space", key);
        anyhow::bail!(Error::MalformedRequest(reason))
    }

    /// List the key and path of every record on disk, sorted by key.
    pub(crate) async fn scan(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut records = Vec::new();
        for (dir, prefix) in SPACES {
            let path = self.home.join(dir);
            let mut entries = tokio::fs::read_dir(&path)
                .await
                .with_context(|| Error::internal(format!("unable to list {}", path.display())))?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if let Some(pk) = record_name(&path) {
                    records.push((format!("{}{}", prefix, pk), path));
                }
            }
        }
        records.sort();
        Ok(records)
    }

    /// Unique path of a temporary file next to `path`.
    fn temp_path(&self, path: &Path) -> PathBuf {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}.tmp", name, sequence))
    }
}

/// Primary key of a record file, or `None` for other files.
fn record_name(path: &Path) -> Option<String> {
    if path.extension()? != RECORD_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}
