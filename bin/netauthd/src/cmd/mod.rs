//! Built-in `netauthd` commands.
use clap::Parser;
use clap::Subcommand;

pub mod check;
pub mod server;

/// NetAuth authentication and authorization server.
#[derive(Debug, Parser)]
#[command(version = crate::VERSION, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the NetAuth configuration to use.
    #[arg(
        short = 'c',
        long = "config",
        env = "NETAUTH_CONFIG",
        default_value_t = String::from("/etc/netauth/config.yaml"),
    )]
    pub config: String,

    /// Select the netauthd command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Select the netauthd command to run.
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Validate the configuration and the options of the selected backends.
    #[command(alias = "conf-check")]
    Check,

    /// Run the NetAuth server.
    #[command(alias = "run")]
    Server,
}
