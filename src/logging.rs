use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const FILTER_ENV: &str = "SHAREFIND_LOG";

/// Log to stderr, keeping stdout for results.
pub fn init_logger(verbosity: u8) {
    let filter = EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).without_time())
        .with(filter)
        .init();
}
