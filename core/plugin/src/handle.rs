//! Handles to loaded plugins.
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as AnyContext;
use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::process::Child;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::process::Command;
use tokio::sync::Mutex;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_models::Entity;
use netauth_models::Group;

use crate::protocol::Call;
use crate::protocol::EntityOpts;
use crate::protocol::GroupOpts;
use crate::protocol::Request;
use crate::protocol::Response;
use crate::protocol::MAGIC_COOKIE_KEY;
use crate::protocol::MAGIC_COOKIE_VALUE;
use crate::sdk::Plugin;

/// Time allowed for a plugin process to complete the handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for a plugin process to answer a call.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// The plugin process did not complete the handshake.
#[derive(Debug, thiserror::Error)]
#[error("plugin '{plugin}' failed the handshake: {reason}")]
pub struct HandshakeError {
    pub plugin: String,
    pub reason: String,
}

/// Invoke a loaded plugin.
#[async_trait::async_trait]
pub trait PluginHandle: Send + Sync {
    /// Name the plugin is known by (its path for process plugins).
    fn name(&self) -> &str;

    /// Process an entity and return the updated entity.
    async fn process_entity(&self, context: &Context, opts: EntityOpts) -> Result<Entity>;

    /// Process a group and return the updated group.
    async fn process_group(&self, context: &Context, opts: GroupOpts) -> Result<Group>;

    /// Stop the plugin.
    async fn kill(&self, context: &Context);
}

/// Plugin running in the current process.
///
/// Shares the dispatch logic with plugins served over the IPC protocol,
/// useful for tests and for embedding plugins in the server.
pub struct LocalPlugin {
    name: String,
    plugin: Arc<dyn Plugin>,
}

impl LocalPlugin {
    pub fn new<P, S>(name: S, plugin: P) -> LocalPlugin
    where
        P: Plugin + 'static,
        S: Into<String>,
    {
        LocalPlugin {
            name: name.into(),
            plugin: Arc::new(plugin),
        }
    }
}

#[async_trait::async_trait]
impl PluginHandle for LocalPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_entity(&self, context: &Context, opts: EntityOpts) -> Result<Entity> {
        crate::sdk::dispatch_entity(self.plugin.as_ref(), context, opts).await
    }

    async fn process_group(&self, context: &Context, opts: GroupOpts) -> Result<Group> {
        crate::sdk::dispatch_group(self.plugin.as_ref(), context, opts).await
    }

    async fn kill(&self, _: &Context) {}
}

/// Plugin running in a child process, invoked over its stdin and stdout.
///
/// Calls to the same plugin are serialised.
///
/// A call that is cancelled or times out may leave the IPC channel mid-message,
/// so the process is killed and every later call fails straight away.
pub struct ProcessHandle {
    broken: AtomicBool,
    call_timeout: Duration,
    child: Mutex<Child>,
    channel: Mutex<Channel>,
    name: String,
    next_id: AtomicU64,
}

struct Channel {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl ProcessHandle {
    /// Start a plugin process and perform the handshake.
    ///
    /// The process is killed if the handshake fails.
    pub async fn spawn(context: &Context, path: &Path) -> Result<ProcessHandle> {
        let name = path.display().to_string();
        let mut child = Command::new(path)
            .env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("unable to start plugin '{}'", name))?;

        let stdin = child.stdin.take().context("plugin stdin not captured")?;
        let stdout = child.stdout.take().context("plugin stdout not captured")?;
        let mut stdout = BufReader::new(stdout).lines();

        let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, stdout.next_line()).await;
        let failure = match handshake {
            Err(_) => Some("timeout waiting for handshake".to_string()),
            Ok(Err(error)) => Some(error.to_string()),
            Ok(Ok(None)) => Some("process exited before handshake".to_string()),
            Ok(Ok(Some(line))) if line.trim() != crate::protocol::handshake() => {
                Some(format!("unsupported handshake '{}'", line.trim()))
            }
            Ok(Ok(Some(_))) => None,
        };
        if let Some(reason) = failure {
            let _ = child.kill().await;
            anyhow::bail!(HandshakeError {
                plugin: name,
                reason,
            });
        }

        slog::debug!(context.logger, "Plugin process started"; "plugin" => &name);
        Ok(ProcessHandle {
            broken: AtomicBool::new(false),
            call_timeout: CALL_TIMEOUT,
            child: Mutex::new(child),
            channel: Mutex::new(Channel { stdin, stdout }),
            name,
            next_id: AtomicU64::new(1),
        })
    }

    /// Change the time allowed for the plugin to answer each call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> ProcessHandle {
        self.call_timeout = timeout;
        self
    }

    /// Send a call and wait for its response, unless the context is cancelled first.
    async fn call(&self, context: &Context, call: Call) -> Result<Response> {
        if self.broken.load(Ordering::SeqCst) {
            anyhow::bail!(self.error("plugin disabled after an interrupted call"));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request { id, call };
        let mut encoded = serde_json::to_vec(&request)?;
        encoded.push(b'\n');

        let exchange = tokio::time::timeout(self.call_timeout, self.exchange(&encoded, id));
        let outcome = tokio::select! {
            _ = context.cancelled() => None,
            outcome = exchange => Some(outcome),
        };
        match outcome {
            None => {
                self.disable(context, "call cancelled").await;
                anyhow::bail!(Error::Cancelled)
            }
            Some(Err(_)) => {
                self.disable(context, "call timed out").await;
                let message = format!("no response within {:?}", self.call_timeout);
                anyhow::bail!(self.error(message))
            }
            Some(Ok(response)) => response.map_err(|error| {
                let message = format!("{:#}", error);
                error.context(self.error(message))
            }),
        }
    }

    async fn exchange(&self, encoded: &[u8], id: u64) -> Result<Response> {
        let mut channel = self.channel.lock().await;
        channel.stdin.write_all(encoded).await?;
        channel.stdin.flush().await?;
        let line = match channel.stdout.next_line().await? {
            Some(line) => line,
            None => anyhow::bail!("plugin process exited"),
        };
        let response: Response = serde_json::from_str(&line)
            .with_context(|| format!("invalid response from plugin: {}", line))?;
        if response.id != id {
            anyhow::bail!("response {} does not match call {}", response.id, id);
        }
        Ok(response)
    }

    /// Stop using the plugin after the channel was left in an unknown state.
    async fn disable(&self, context: &Context, reason: &'static str) {
        self.broken.store(true, Ordering::SeqCst);
        slog::warn!(
            context.logger, "Disabling plugin after interrupted call";
            "plugin" => &self.name,
            "reason" => reason,
        );
        let mut child = self.child.lock().await;
        if let Err(error) = child.kill().await {
            slog::debug!(
                context.logger, "Unable to kill plugin process";
                "plugin" => &self.name,
                "error" => %error,
            );
        }
    }

    fn error<S: Into<String>>(&self, message: S) -> Error {
        Error::Plugin {
            plugin: self.name.clone(),
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
impl PluginHandle for ProcessHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_entity(&self, context: &Context, opts: EntityOpts) -> Result<Entity> {
        let response = self.call(context, Call::ProcessEntity(opts)).await?;
        if let Some(error) = response.error {
            anyhow::bail!(self.error(error));
        }
        Ok(response.entity.unwrap_or_default())
    }

    async fn process_group(&self, context: &Context, opts: GroupOpts) -> Result<Group> {
        let response = self.call(context, Call::ProcessGroup(opts)).await?;
        if let Some(error) = response.error {
            anyhow::bail!(self.error(error));
        }
        Ok(response.group.unwrap_or_default())
    }

    async fn kill(&self, context: &Context) {
        // Ask politely first, the process is killed regardless.
        if let Ok(mut channel) = self.channel.try_lock() {
            let request = Request {
                id: 0,
                call: Call::Shutdown,
            };
            if let Ok(mut encoded) = serde_json::to_vec(&request) {
                encoded.push(b'\n');
                let _ = channel.stdin.write_all(&encoded).await;
                let _ = channel.stdin.flush().await;
            }
        }
        let mut child = self.child.lock().await;
        if let Err(error) = child.kill().await {
            slog::debug!(
                context.logger, "Unable to kill plugin process";
                "plugin" => &self.name,
                "error" => %error,
            );
        }
    }
}
