//! This module handles the initial setup of the application.
use super::args::AppArgs;
use super::config::{FileConfig, Settings, CACHE_NAMESPACE};
use crate::lang::{Catalog, Translator};
use crate::logging;
use crate::storage::{LocalStore, MemoryLocalStore, SledLocalStore};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Contains all the necessary components for the application to run.
///
/// This struct is created by the `prepare` function and passed to
/// `tail::run`.
pub struct PreparedApp {
    /// The effective settings.
    pub settings: Settings,
    /// The translator for interface strings, already initialized.
    pub translator: Translator,
}

/// Prepares the application for running.
///
/// This function performs the following steps:
/// 1. Resolves settings from the config file and the command line.
/// 2. Configures logging.
/// 3. Opens the local cache in the data directory (unless disabled).
/// 4. Builds the language catalog and restores the translator.
/// 5. Applies the requested language, waiting for its map.
///
/// # Errors
///
/// This function will return an error if the settings are incomplete or the
/// data directory cannot be opened.
pub async fn prepare(args: AppArgs) -> Result<PreparedApp> {
    let file = match &args.config {
        Some(path) => FileConfig::load(Path::new(path))?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(&args, file)?;

    logging::init_subscriber(settings.verbose);

    let store: Arc<dyn LocalStore> = if settings.use_cache {
        std::fs::create_dir_all(&settings.data_dir).with_context(|| {
            format!("failed to create data directory {}", settings.data_dir.display())
        })?;
        let db = sled::open(settings.data_dir.join("db"))?;
        Arc::new(SledLocalStore::new(&db)?)
    } else {
        Arc::new(MemoryLocalStore::new())
    };

    let catalog = match &settings.lang_dir {
        Some(dir) => Catalog::from_dir(dir)?,
        None => Catalog::builtin(),
    };
    let translator = Translator::new(catalog, store, CACHE_NAMESPACE)?;

    if let Err(e) = translator.initialize().await {
        warn!("{}", e);
    }
    if let Some(code) = &settings.lang {
        select_language(&translator, code).await;
    }
    info!("{}", translator.translate("lang.selected", &[&translator.language()]));

    Ok(PreparedApp {
        settings,
        translator,
    })
}

/// Switches the interface language and waits briefly for its strings.
async fn select_language(translator: &Translator, code: &str) {
    let mut rx = translator.subscribe();
    let before = rx.borrow_and_update().map.clone();

    let Some(lang) = translator.set_language(code) else {
        let available = translator
            .languages()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        warn!("{}", translator.translate("lang.unknown", &[&code, &available]));
        return;
    };

    // A map that was already installed before the switch does not count.
    let loaded = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        rx.wait_for(|s| match (&s.map, &before) {
            (Some(now), Some(old)) => !Arc::ptr_eq(now, old),
            (Some(_), None) => true,
            (None, _) => false,
        }),
    )
    .await
    .map(|res| res.is_ok())
    .unwrap_or(false);

    if !loaded {
        warn!("Translations for {} are not loaded yet", lang);
    }
}
