//! This module defines the local storage used to cache translator state.
pub mod local;

pub use local::{LocalStore, MemoryLocalStore, SledLocalStore};
