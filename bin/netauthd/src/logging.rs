//! Process logging initialisation.
use std::sync::Mutex;

use slog::o;
use slog::Drain;
use slog::IgnoreResult;
use slog::LevelFilter;
use slog::Logger;

use netauth_conf::LogConf;
use netauth_conf::LogFormat;

/// Create the root [`Logger`] for the process from the configuration.
pub fn configure(conf: &LogConf) -> Logger {
    match conf.format {
        LogFormat::Json => {
            let drain = slog_json::Json::new(std::io::stdout())
                .add_default_keys()
                .build();
            finish(conf, drain)
        }
        LogFormat::Term => {
            let decorator = slog_term::TermDecorator::new().stdout().build();
            let drain = slog_term::FullFormat::new(decorator).build();
            finish(conf, drain)
        }
    }
}

/// Wrap a formatting drain with level filtering and optional async dispatch.
fn finish<D>(conf: &LogConf, drain: D) -> Logger
where
    D: Drain<Ok = ()> + Send + 'static,
{
    let values = o!(
        "version" => env!("CARGO_PKG_VERSION"),
        "git_hash" => env!("GIT_BUILD_HASH"),
    );
    let drain = Mutex::new(drain).map(IgnoreResult::new);
    let drain = LevelFilter::new(drain, slog::Level::from(conf.level)).ignore_res();

    if conf.async_ {
        let drain = slog_async::Async::new(drain).build().ignore_res();
        return Logger::root(drain, values);
    }
    Logger::root(drain, values)
}

#[cfg(test)]
mod tests {
    use netauth_conf::LogConf;
    use netauth_conf::LogFormat;
    use netauth_conf::LogLevel;

    #[test]
    fn configure_sync_term_logger() {
        let conf = LogConf {
            async_: false,
            format: LogFormat::Term,
            level: LogLevel::Debug,
        };
        let logger = super::configure(&conf);
        slog::debug!(logger, "term logger configured");
    }

    #[test]
    fn configure_async_json_logger() {
        let conf = LogConf::default();
        let logger = super::configure(&conf);
        slog::info!(logger, "json logger configured");
    }
}
