use slog::Logger;
use sloggers::Config;
use sloggers::LoggerConfig;

/// Builds the process-wide logger from a `sloggers` TOML config
/// snippet, e.g. `type="terminal"\nlevel="debug"\ndestination="stderr"`.
/// Falls back to a sane terminal logger if parsing fails, since a
/// malformed log config shouldn't be a fatal startup error.
pub fn init(raw_toml: &str) -> Logger {
    match serdeconv::from_toml_str::<LoggerConfig>(raw_toml) {
        Ok(config) => config.build_logger().unwrap_or_else(|_| default_logger()),
        Err(_) => default_logger(),
    }
}

pub fn default() -> Logger {
    init(DEFAULT_LOGGER_TOML)
}

fn default_logger() -> Logger {
    sloggers::terminal::TerminalLoggerBuilder::new()
        .level(sloggers::types::Severity::Debug)
        .destination(sloggers::terminal::Destination::Stderr)
        .build()
        .expect("terminal logger builds with no I/O dependency")
}

const DEFAULT_LOGGER_TOML: &str = "type=\"terminal\"\nlevel=\"debug\"\ndestination=\"stderr\"\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_logger_builds() {
        let log = default();
        slog::info!(log, "logger smoke test");
    }

    #[test]
    fn malformed_config_falls_back() {
        let log = init("not valid toml {{{");
        slog::info!(log, "fallback logger smoke test");
    }
}
