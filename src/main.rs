//! The main entry point for the logio-dashboard application.
mod app;
mod lang;
mod logging;
mod logio;
mod storage;

use anyhow::Result;

/// The main function of the application.
///
/// Parses command-line arguments, restores the translator from the local
/// cache, dials the `log.io` endpoint and streams log records to the
/// terminal until the connection ends or the user interrupts.
///
/// # Errors
///
/// Returns an error if setup fails or the log stream cannot be dialed.
#[tokio::main]
async fn main() -> Result<()> {
    app::launch().await
}
