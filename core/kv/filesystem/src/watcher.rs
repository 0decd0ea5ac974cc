//! Poll data directories to emit events for records changed by other processes.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use anyhow::Result;
use tokio::time::MissedTickBehavior;

use netauth_context::Context;

use crate::Shared;

/// Modification time and size of a record file.
type Stamp = (Option<SystemTime>, u64);

/// Compare snapshots of the data directories until the context is cancelled.
pub(crate) async fn run(context: Context, shared: Arc<Shared>, interval: Duration) {
    slog::debug!(context.logger, "Starting filesystem watcher"; "interval" => ?interval);
    let mut known = match snapshot(&shared).await {
        Ok(known) => known,
        Err(error) => {
            slog::warn!(
                context.logger, "Filesystem watcher failed initial scan";
                "error" => format!("{:?}", error),
            );
            HashMap::new()
        }
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = context.cancelled() => break,
            _ = ticker.tick() => (),
        }
        let current = match snapshot(&shared).await {
            Ok(current) => current,
            Err(error) => {
                slog::warn!(
                    context.logger, "Filesystem watcher failed to scan data directories";
                    "error" => format!("{:?}", error),
                );
                continue;
            }
        };

        for (key, stamp) in current.iter() {
            if known.get(key) != Some(stamp) {
                shared.emitter.emit(&context, key, false).await;
            }
        }
        for key in known.keys() {
            if !current.contains_key(key) {
                shared.emitter.emit(&context, key, true).await;
            }
        }
        known = current;
    }
    slog::debug!(context.logger, "Filesystem watcher stopped");
}

async fn snapshot(shared: &Shared) -> Result<HashMap<String, Stamp>> {
    let mut stamps = HashMap::new();
    for (key, path) in shared.scan().await? {
        match tokio::fs::metadata(&path).await {
            Ok(meta) => {
                stamps.insert(key, (meta.modified().ok(), meta.len()));
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
            Err(error) => return Err(error.into()),
        }
    }
    Ok(stamps)
}
