//! Streams the log feed to the terminal until it ends or the user interrupts.
use super::config::Settings;
use crate::lang::Translator;
use crate::logging::RecordPrinter;
use crate::logio::{self, CloseReason};
use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long to wait for the close frame to go out before exiting.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

pub async fn run(settings: Settings, translator: Translator) -> Result<()> {
    println!(
        "{}",
        translator.translate("tail.connecting", &[&settings.dial.origin])
    );

    let client = match logio::dial(&settings.dial, &settings.token).await {
        Ok(client) => client,
        Err(e) => {
            let message = translator.translate("dial.failed", &[&e]);
            return Err(anyhow::Error::new(e).context(message));
        }
    };

    let printer = RecordPrinter::new(translator.clone());
    let _logs = client.add_log_listener(move |record| printer.print(record));

    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel::<Option<CloseReason>>();
    let _closes = client.add_close_listener(move |reason| {
        let _ = closed_tx.send(reason.clone());
    });

    client.start();
    println!("{}", translator.translate("tail.connected", &[]));

    if let Some(level) = settings.level {
        client.set_level(level);
        info!(
            "{}",
            translator.translate("tail.level_requested", &[&level])
        );
    }

    let reason = tokio::select! {
        reason = closed_rx.recv() => reason.flatten(),
        _ = tokio::signal::ctrl_c() => {
            println!("{}", translator.translate("tail.interrupted", &[]));
            client.close();
            None
        }
    };
    if tokio::time::timeout(CLOSE_GRACE, client.closed()).await.is_err() {
        warn!("log.io connection did not close within {:?}", CLOSE_GRACE);
    }
    debug!("Log stream finished: {:?}", client);

    match reason {
        Some(reason) => {
            let message = translator.translate("tail.closed_with_reason", &[&reason]);
            println!("{}", message);
            Err(anyhow!(message))
        }
        None => {
            println!("{}", translator.translate("tail.closed", &[]));
            Ok(())
        }
    }
}
