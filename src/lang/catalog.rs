//! Available languages and the loaders that produce their translation maps.
use super::code::Lang;
use super::map::TranslationMap;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rust_embed::RustEmbed;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(RustEmbed)]
#[folder = "assets/lang"]
struct BuiltinLangs;

/// Produces the translation map for one language.
#[async_trait]
pub trait LangLoader: Send + Sync {
    /// Loads the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or is not a mapping.
    async fn load(&self) -> Result<TranslationMap>;
}

/// Loads a language file compiled into the binary.
pub struct EmbeddedLoader {
    file: String,
}

impl EmbeddedLoader {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into() }
    }
}

#[async_trait]
impl LangLoader for EmbeddedLoader {
    async fn load(&self) -> Result<TranslationMap> {
        let asset = BuiltinLangs::get(&self.file)
            .ok_or_else(|| anyhow!("no built-in language file '{}'", self.file))?;
        serde_json::from_slice(&asset.data)
            .with_context(|| format!("built-in language file '{}' is not a mapping", self.file))
    }
}

/// Loads a language file from disk.
pub struct FileLoader {
    path: PathBuf,
}

impl FileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LangLoader for FileLoader {
    async fn load(&self) -> Result<TranslationMap> {
        let data = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("{} is not a translation mapping", self.path.display()))
    }
}

/// A language code paired with the loader for its map.
#[derive(Clone)]
pub struct LanguageEntry {
    pub code: Lang,
    pub loader: Arc<dyn LangLoader>,
}

impl LanguageEntry {
    pub fn new(code: Lang, loader: impl LangLoader + 'static) -> Self {
        Self {
            code,
            loader: Arc::new(loader),
        }
    }
}

impl std::fmt::Debug for LanguageEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageEntry")
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}

/// The ordered set of available languages. The first entry is the default.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: Vec<LanguageEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<LanguageEntry>) -> Self {
        Self { entries }
    }

    /// The languages shipped inside the binary: `en-US` and `zh-CN`.
    pub fn builtin() -> Self {
        Self::new(
            ["en-US", "zh-CN"]
                .into_iter()
                .map(|code| {
                    let loader = EmbeddedLoader::new(format!("{}.json", code));
                    LanguageEntry::new(Lang::new(code), loader)
                })
                .collect(),
        )
    }

    /// One entry per `<code>.json` file in `dir`, sorted by code with
    /// `en-US` first when present.
    ///
    /// Files are only listed here; their contents are read by the loader.
    ///
    /// # Errors
    ///
    /// This function will return an error if `dir` cannot be listed.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("failed to list language directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            entries.push(LanguageEntry::new(Lang::new(stem), FileLoader::new(path.clone())));
        }

        let default = Lang::new("en-US");
        entries.sort_by_key(|entry| (entry.code != default, entry.code.to_string()));
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[LanguageEntry] {
        &self.entries
    }

    /// Index of the first entry whose code matches `code`.
    pub fn position(&self, code: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.code.matches_str(code))
    }
}
