use chrono::Local;
use std::io;
use std::path::PathBuf;
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Initialize tracing with a file logger that writes to a timestamp-named
/// file under `~/.sluice`. The filter is read from `RUST_LOG`.
///
/// Returns the log file path, or `None` when logging to stderr because no
/// home directory is known.
pub fn init_tracing() -> io::Result<Option<PathBuf>> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filter = EnvFilter::from_default_env();

    if let Some(home_dir) = dirs::home_dir() {
        let log_dir = home_dir.join(".sluice");
        std::fs::create_dir_all(&log_dir)?;

        let file_name = format!("{timestamp}.log");
        let file_appender = rolling::never(&log_dir, &file_name);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::new()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter);

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        let path = log_dir.join(file_name);
        tracing::debug!(
            target: "sluice::utils::tracing",
            path = %path.display(),
            "Tracing initialized with file output. Filter configured via RUST_LOG env var."
        );
        Ok(Some(path))
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::default()
                    .with_writer(io::stderr)
                    .with_target(true),
            )
            .with(filter);

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "sluice::utils::tracing",
            "Tracing initialized with stderr output. Filter configured via RUST_LOG env var."
        );
        Ok(None)
    }
}
