//! The translator service: current language, current map and key lookup.
use super::catalog::Catalog;
use super::code::Lang;
use super::map::{interpolate, placeholder, TranslationMap};
use crate::storage::LocalStore;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TranslatorError {
    #[error("the language catalog is empty")]
    EmptyCatalog,
    #[error("failed to load translations for {lang}: {reason}")]
    Load { lang: Lang, reason: String },
}

/// The selected language and the map currently used for lookups.
#[derive(Clone, Debug)]
pub struct Selection {
    pub lang: Lang,
    /// `None` until a map for some language has been installed.
    pub map: Option<Arc<TranslationMap>>,
    index: usize,
    generation: u64,
}

struct CacheKeys {
    lang: String,
    map: String,
}

struct Inner {
    catalog: Catalog,
    store: Arc<dyn LocalStore>,
    keys: CacheKeys,
    state: watch::Sender<Selection>,
    initialized: AtomicBool,
}

/// Resolves translation keys for the selected language.
///
/// Cloning is cheap; all clones share the same selection.
#[derive(Clone)]
pub struct Translator {
    inner: Arc<Inner>,
}

impl Translator {
    /// Creates a translator with the catalog's first language selected and
    /// no map loaded. Cache keys are `<namespace>.tr.lang` and
    /// `<namespace>.tr.map`.
    pub fn new(
        catalog: Catalog,
        store: Arc<dyn LocalStore>,
        namespace: &str,
    ) -> Result<Self, TranslatorError> {
        let default = catalog
            .entries()
            .first()
            .ok_or(TranslatorError::EmptyCatalog)?
            .code
            .clone();

        let (state, _) = watch::channel(Selection {
            lang: default,
            map: None,
            index: 0,
            generation: 0,
        });

        Ok(Self {
            inner: Arc::new(Inner {
                catalog,
                store,
                keys: CacheKeys {
                    lang: format!("{}.tr.lang", namespace),
                    map: format!("{}.tr.map", namespace),
                },
                state,
                initialized: AtomicBool::new(false),
            }),
        })
    }

    /// Restores the cached language and map, then loads the authoritative
    /// map for the selected language.
    ///
    /// The cached map is visible to lookups while the load runs. Only the
    /// first call does anything.
    ///
    /// # Errors
    ///
    /// This function will return an error if the selected language's map
    /// cannot be loaded. The cached map, if any, stays in use. Cache read and
    /// write failures are only logged.
    pub async fn initialize(&self) -> Result<(), TranslatorError> {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let inner = &self.inner;

        match inner.store.get_item(&inner.keys.lang) {
            Ok(Some(cached)) => match inner.catalog.position(&cached) {
                Some(index) => {
                    inner.select(index);
                    inner.store_item(&inner.keys.lang, &cached);
                }
                None => debug!("Ignoring cached language '{}'", cached),
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to read cached language: {:#}", e),
        }

        match inner.store.get_item(&inner.keys.map) {
            Ok(Some(data)) => match serde_json::from_str::<TranslationMap>(&data) {
                Ok(map) => {
                    debug!("Using cached translation map until the load completes");
                    inner.state.send_modify(|s| s.map = Some(Arc::new(map)));
                }
                Err(e) => debug!("Ignoring cached translation map: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to read cached translation map: {:#}", e),
        }

        let (index, generation) = {
            let state = inner.state.borrow();
            (state.index, state.generation)
        };
        inner.load(index, generation).await
    }

    /// The currently selected language.
    pub fn language(&self) -> Lang {
        self.inner.state.borrow().lang.clone()
    }

    /// The codes of all available languages, default first.
    pub fn languages(&self) -> Vec<Lang> {
        self.inner
            .catalog
            .entries()
            .iter()
            .map(|entry| entry.code.clone())
            .collect()
    }

    /// Switches to the first available language matching `code`.
    ///
    /// The switch is immediate; the new map is loaded in the background and
    /// the previous map stays in use until it arrives. Returns the matched
    /// code, or `None` (changing nothing) if no language matches.
    ///
    /// # Arguments
    ///
    /// * `code` - A language tag such as `zh-CN`, `zh_cn` or `zh`.
    ///
    /// A failed background load is logged and leaves the previous map in
    /// place.
    pub fn set_language(&self, code: &str) -> Option<Lang> {
        let index = self.inner.catalog.position(code)?;
        let lang = self.inner.catalog.entries()[index].code.clone();

        self.inner.store_item(&self.inner.keys.lang, &lang.to_string());
        let generation = self.inner.select(index);
        info!("Language switched to {}", lang);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = self.inner.clone();
                handle.spawn(async move {
                    let _ = inner.load(index, generation).await;
                });
            }
            Err(_) => warn!("No async runtime; translations for {} are not loaded", lang),
        }
        Some(lang)
    }

    /// Looks `key` up in the current map and fills `{n}` placeholders with
    /// `values`. Unresolvable keys come back as `{{key}}`.
    pub fn translate(&self, key: &str, values: &[&dyn fmt::Display]) -> String {
        self.lookup(key, values).unwrap_or_else(|| placeholder(key))
    }

    /// Like [`Translator::translate`], but `None` when no map is loaded or
    /// the key does not resolve.
    pub fn lookup(&self, key: &str, values: &[&dyn fmt::Display]) -> Option<String> {
        let state = self.inner.state.borrow();
        let text = state.map.as_deref()?.lookup(key)?;
        Some(interpolate(text, values))
    }

    /// Observes language and map changes.
    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.inner.state.subscribe()
    }
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Translator")
            .field("lang", &state.lang)
            .field("loaded", &state.map.is_some())
            .finish()
    }
}

impl Inner {
    /// Selects a catalog entry, keeping the current map, and returns the new
    /// generation.
    fn select(&self, index: usize) -> u64 {
        let lang = self.catalog.entries()[index].code.clone();
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.lang = lang;
            s.index = index;
            s.generation += 1;
            generation = s.generation;
        });
        generation
    }

    /// Loads the map for `index` and installs it if the selection has not
    /// changed since `generation`.
    async fn load(&self, index: usize, generation: u64) -> Result<(), TranslatorError> {
        let entry = &self.catalog.entries()[index];
        let map = match entry.loader.load().await {
            Ok(map) => Arc::new(map),
            Err(e) => {
                warn!("Failed to load translations for {}: {:#}", entry.code, e);
                return Err(TranslatorError::Load {
                    lang: entry.code.clone(),
                    reason: format!("{:#}", e),
                });
            }
        };

        let installed = self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.map = Some(map.clone());
            true
        });
        if !installed {
            debug!("Discarding translations for {}; selection changed", entry.code);
            return Ok(());
        }

        debug!("Installed translations for {}", entry.code);
        match serde_json::to_string(map.as_ref()) {
            Ok(data) => self.store_item(&self.keys.map, &data),
            Err(e) => warn!("Failed to serialize translation map: {}", e),
        }
        Ok(())
    }

    fn store_item(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set_item(key, value) {
            warn!("Failed to cache '{}': {:#}", key, e);
        }
    }
}
