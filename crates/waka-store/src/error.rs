use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error{} at line {line}: {message}", in_path(.path))]
    Parse {
        path: Option<PathBuf>,
        line: usize,
        message: String,
    },

    #[error("failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not resolve home directory: {0}")]
    NoHome(String),

    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

fn in_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

impl StoreError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Attach the file path to a parse error produced from in-memory text.
    pub fn with_path(self, file: &Path) -> Self {
        match self {
            StoreError::Parse {
                path: None,
                line,
                message,
            } => StoreError::Parse {
                path: Some(file.to_path_buf()),
                line,
                message,
            },
            other => other,
        }
    }
}
