//! This module contains the logging setup for the application and the
//! terminal rendering of streamed log records.
pub mod printer;

pub use printer::RecordPrinter;

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug output for
/// this crate and warnings for everything else.
pub fn init_subscriber(verbose: bool) {
    let default = if verbose {
        "warn,logio_dashboard=debug"
    } else {
        "warn,logio_dashboard=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
