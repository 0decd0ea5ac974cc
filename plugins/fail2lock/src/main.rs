use anyhow::Result;
use clap::Parser;

use netauth_plugin::sdk;
use netauth_plugin_fail2lock::Fail2Lock;
use netauth_plugin_fail2lock::DEFAULT_THRESHOLD;

/// NetAuth tree plugin locking out entities after repeated authentication failures.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Number of failed authentication attempts allowed before lock out.
    #[arg(long, env = "NETAUTH_FAIL2LOCK_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = sdk::plugin_context("fail2lock");
    slog::info!(context.logger, "Starting fail2lock plugin"; "threshold" => cli.threshold);
    sdk::serve(&context, Fail2Lock::new(cli.threshold)).await
}
