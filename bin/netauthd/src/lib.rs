//! Combine individual logical units to initialise and run a NetAuth server process.
use anyhow::Context as AnyContext;
use anyhow::Result;
use clap::Parser;

use netauth_conf::Conf;

mod cmd;
mod init;
pub mod logging;

pub use self::cmd::Cli;
pub use self::init::Backends;

/// Version of the running process, including the git commit it was built from.
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_BUILD_HASH"), ")");

/// Initialise the netauthd process and invoke a command implementation.
pub async fn execute(cli: Cli, conf: Conf) -> Result<()> {
    match cli.command {
        cmd::Command::Check => cmd::check::run(cli, conf).await,
        cmd::Command::Server => cmd::server::run(cli, conf).await,
    }
}

/// Initialise the async runtime for the process and invoke [`execute`].
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let conf = netauth_conf::load(&cli.config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed tokio runtime initialisation")?;
    runtime.block_on(execute(cli, conf))
}
