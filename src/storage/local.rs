//! This module defines the local key-value cache used to persist the
//! selected language and its translation map between runs.
use anyhow::{Context, Result};
use sled::Db;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// A string key-value store in the manner of a browser's local storage.
///
/// Calls are synchronous so they can be made from non-async code paths such
/// as a language switch.
pub trait LocalStore: Send + Sync {
    /// Retrieves the value stored under `key`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the value cannot be read or is
    /// not valid UTF-8.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// This function will return an error if the value cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// A `LocalStore` implementation using `sled` for storage.
pub struct SledLocalStore {
    tree: sled::Tree,
}

impl SledLocalStore {
    /// Creates a new `SledLocalStore`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the `local_storage` tree cannot
    /// be opened.
    pub fn new(db: &Db) -> Result<Self> {
        let tree = db.open_tree("local_storage")?;
        Ok(Self { tree })
    }
}

impl LocalStore for SledLocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        match self.tree.get(key.as_bytes())? {
            Some(data) => {
                let value = String::from_utf8(data.to_vec())
                    .with_context(|| format!("cached value for '{}' is not UTF-8", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.tree.insert(key.as_bytes(), value.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }
}

/// A `LocalStore` that lives only as long as the process.
#[derive(Default)]
pub struct MemoryLocalStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
