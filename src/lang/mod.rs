//! Translation lookup for user-facing strings.
//!
//! A [`Translator`] holds the selected language and its [`TranslationMap`],
//! resolves dotted keys against it and caches both in a [`LocalStore`] so
//! the next start can show strings before the language file is loaded.
//!
//! [`LocalStore`]: crate::storage::LocalStore
pub mod catalog;
pub mod code;
pub mod map;
pub mod translator;

pub use catalog::{Catalog, LangLoader, LanguageEntry};
pub use code::Lang;
pub use map::{TrValue, TranslationMap};
pub use translator::{Selection, Translator, TranslatorError};
