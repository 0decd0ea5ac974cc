//! Validate server configuration without starting the server.
use anyhow::Result;

use netauth_conf::Conf;

use super::Cli;
use crate::init::Server;

/// Validate the configuration and the options of the selected backends.
pub async fn run(_cli: Cli, conf: Conf) -> Result<()> {
    let server = Server::configure(conf).register_default_backends();
    server.check()?;
    println!("Configuration is valid");
    Ok(())
}
