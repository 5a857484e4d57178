//! Logging setup
//!
//! Console output always; a daily rolling file as well when a log
//! directory is configured. `RUST_LOG` overrides the configured level.

use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Filter used when `RUST_LOG` is unset or unparseable
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber
///
/// # Returns
///
/// * `Some(WorkerGuard)` - Keep alive for the process lifetime; dropping it
///   flushes and closes the log file
/// * `None` - Console logging only
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let console = tracing_subscriber::fmt::layer().with_writer(io::stdout);

    if config.directory.is_empty() {
        tracing_subscriber::registry()
            .with(env_filter(&config.level))
            .with(console)
            .init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let file = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(console)
        .with(file)
        .init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_filter_accepts_configured_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let filter = EnvFilter::new(level);
            assert!(!filter.to_string().is_empty());
        }
    }

    #[test]
    fn test_rolling_file_written_through_non_blocking() {
        // The global subscriber can only be set once, so exercise the writer directly
        let dir = TempDir::new().unwrap();
        let appender = tracing_appender::rolling::daily(dir.path(), "gnss-uplink.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);

        {
            use std::io::Write;
            let mut w = writer.make_writer();
            w.write_all(b"cycle started\n").unwrap();
        }
        drop(guard);

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("gnss-uplink.log"));
        assert_eq!(fs::read_to_string(&files[0]).unwrap(), "cycle started\n");
    }
}
