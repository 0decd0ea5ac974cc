//! Process initialisation logic for the NetAuth server.
mod backends;
mod server;

pub use self::backends::Backends;
pub use self::server::Server;
