use slog::Logger;
use sloggers::Build;

/// A plain stderr terminal logger, matching the server's fallback
/// logger since the client has no config file to source one from.
pub fn default() -> Logger {
    sloggers::terminal::TerminalLoggerBuilder::new()
        .level(sloggers::types::Severity::Info)
        .destination(sloggers::terminal::Destination::Stderr)
        .build()
        .expect("terminal logger builds with no I/O dependency")
}
