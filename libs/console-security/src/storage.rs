//! Key/value persistence seam for session state.
//!
//! The console persists its session in a browser-style string store. Any
//! medium works as long as it offers get/set/remove on string keys.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::SessionError;

/// String key/value store backing a [`crate::SessionContext`].
pub trait SessionStorage: Send + Sync {
    /// Read a key.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Write a key, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the medium cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Remove a key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// Process-local storage, used by tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
