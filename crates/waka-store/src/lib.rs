pub mod error;
pub mod ini;
pub mod store;

use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub use error::StoreError;
pub use ini::IniFile;
pub use store::{IniFileStore, Key, MemoryStore, SettingsStore};

/// Environment variable overriding the home directory used for all files.
pub const HOME_ENV: &str = "WAKATIME_HOME";

const CONFIG_FILE: &str = ".wakatime.cfg";
const INTERNAL_DIR: &str = ".wakatime";
const INTERNAL_FILE: &str = "wakatime-internal.cfg";

/// Resolve the home directory: `$WAKATIME_HOME` when set and non-empty,
/// else the user's home directory.
pub fn waka_home_dir() -> Result<PathBuf, StoreError> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir().ok_or_else(|| StoreError::NoHome(format!("{HOME_ENV} unset and no user home")))
}

/// `<home>/.wakatime.cfg`
pub fn config_file_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE)
}

/// `<home>/.wakatime/wakatime-internal.cfg`
pub fn internal_file_path(home: &Path) -> PathBuf {
    home.join(INTERNAL_DIR).join(INTERNAL_FILE)
}

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| StoreError::io(parent, e))?;
    tmp.write_all(data).map_err(|e| StoreError::io(path, e))?;
    tmp.flush().map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

/// File-based exclusive lock guard, released on drop.
pub struct LockGuard {
    _file: fs::File,
}

/// Acquire an exclusive file lock. Creates the lock file if needed.
pub fn lock_file(path: &Path) -> Result<LockGuard, StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    file.lock_exclusive().map_err(|source| StoreError::Lock {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(LockGuard { _file: file })
}
