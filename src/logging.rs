//! Log output for the CLI.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job. Logs go to stderr so stdout stays free for `paperlink list`.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// `--verbose` raises anything quieter than debug to debug.
    pub fn with_verbose(self, verbose: bool) -> Self {
        if verbose && self < LogLevel::Debug {
            LogLevel::Debug
        } else {
            self
        }
    }
}

/// Install the fmt subscriber. Later calls are ignored.
pub fn init_logging(level: LogLevel) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_target(false)
        .try_init();
}
