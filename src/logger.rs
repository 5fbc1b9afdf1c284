use slog::{Drain, Level, LevelFilter, Logger};
use slog_scope::GlobalLoggerGuard;

/// Installs a terminal logger as the global `slog_scope` logger.
///
/// `verbosity` 0 shows warnings and above, 1 adds info, 2 adds debug and
/// anything higher shows everything. Logging stops once the guard is dropped.
pub fn init(verbosity: u64) -> GlobalLoggerGuard {
    let level = match verbosity {
        0 => Level::Warning,
        1 => Level::Info,
        2 => Level::Debug,
        _ => Level::Trace,
    };

    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = LevelFilter::new(drain, level).fuse();

    slog_scope::set_global_logger(Logger::root(drain, o!()))
}
