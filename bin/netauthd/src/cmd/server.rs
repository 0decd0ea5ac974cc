//! Run the NetAuth server.
use anyhow::Result;

use netauth_conf::Conf;

use super::Cli;
use crate::init::Server;

/// Run the NetAuth server until shutdown is requested.
pub async fn run(_cli: Cli, conf: Conf) -> Result<()> {
    Server::configure(conf)
        .register_default_backends()
        .run()
        .await
}
