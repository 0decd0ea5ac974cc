//! NetAuth server configuration object and helpers.
mod loading;
mod log;
mod object;

pub use self::loading::load;
pub use self::loading::Error;
pub use self::log::LogConf;
pub use self::log::LogFormat;
pub use self::log::LogLevel;
pub use self::object::Conf;
pub use self::object::CoreConf;
pub use self::object::EventsConf;
pub use self::object::KeyProvider;
pub use self::object::PdbConf;
pub use self::object::PluginConf;
pub use self::object::RedisConf;
pub use self::object::ServerConf;
pub use self::object::TlsConf;
pub use self::object::TokenConf;

#[cfg(test)]
mod tests;
