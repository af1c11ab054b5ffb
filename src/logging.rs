//! Sets up log output for the binaries.

use std::{fs::OpenOptions, io, path::Path, sync::Arc};

use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Logs are written to stderr at the `info` level, or at whatever level
/// `RUST_LOG` asks for. When `log_file` is given, debug logs are also
/// appended to that file.
///
/// # Errors
/// Returns an error if `log_file` cannot be opened for appending.
pub fn setup_logging(log_file: Option<&Path>) -> Result<(), io::Error> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(io::stderr)
        .with_filter(env_filter);

    let debug_log = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(filter::LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(debug_log)
        .init();

    Ok(())
}
