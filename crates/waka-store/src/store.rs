use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::ini::IniFile;
use crate::{lock_file, write_atomic};

/// Address of one value in a settings store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub section: String,
    pub name: String,
}

impl Key {
    pub fn new(section: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.section, self.name)
    }
}

/// Durable `(section, name) -> string` mapping.
///
/// Implementations give no cross-process ordering guarantee between a `get`
/// and a later `set_keys`; concurrent writers race and the last write wins.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &Key) -> Result<Option<String>, StoreError>;

    /// Write several keys in one operation.
    fn set_keys(&self, entries: &[(Key, String)]) -> Result<(), StoreError>;

    fn set(&self, key: &Key, value: &str) -> Result<(), StoreError> {
        self.set_keys(&[(key.clone(), value.to_string())])
    }
}

// ── File-backed ──

/// Settings store over an INI file on disk.
///
/// Each `set_keys` call re-reads the file under an exclusive lock on a sibling
/// `.lock` file, applies the entries and replaces the file atomically.
#[derive(Debug, Clone)]
pub struct IniFileStore {
    path: PathBuf,
}

impl IniFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }
}

impl SettingsStore for IniFileStore {
    fn get(&self, key: &Key) -> Result<Option<String>, StoreError> {
        let doc = IniFile::load(&self.path)?;
        Ok(doc.get(&key.section, &key.name).map(str::to_string))
    }

    fn set_keys(&self, entries: &[(Key, String)]) -> Result<(), StoreError> {
        let _guard = lock_file(&self.lock_path())?;
        let mut doc = IniFile::load(&self.path)?;
        for (key, value) in entries {
            doc.set(&key.section, &key.name, value);
        }
        write_atomic(&self.path, doc.render().as_bytes())?;
        tracing::debug!(path = %self.path.display(), count = entries.len(), "settings written");
        Ok(())
    }
}

// ── In-memory ──

/// Process-local store, for tests and for running without a writable home.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<Key, String>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = (Key, S)>,
        S: Into<String>,
    {
        let store = Self::default();
        if let Ok(mut map) = store.values.lock() {
            map.extend(values.into_iter().map(|(k, v)| (k, v.into())));
        }
        store
    }

    /// Number of `set_keys` calls observed.
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|n| *n).unwrap_or_default()
    }

    pub fn snapshot(&self) -> BTreeMap<Key, String> {
        self.values.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &Key) -> Result<Option<String>, StoreError> {
        let map = self
            .values
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))?;
        Ok(map.get(key).cloned())
    }

    fn set_keys(&self, entries: &[(Key, String)]) -> Result<(), StoreError> {
        let mut map = self
            .values
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))?;
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        if let Ok(mut n) = self.writes.lock() {
            *n += 1;
        }
        Ok(())
    }
}
