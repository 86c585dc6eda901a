//! Error types for the job engine.
//!
//! `EngineError` covers every failure the engine knows about. Leaf helpers
//! (catalog, checksums) return it with `?`; the job operations turn it into a
//! log line and a `false` result. Only `Busy` ever reaches a caller as an
//! error, because it means no job ran at all.

use std::io;
use std::path::{Path, PathBuf};

/// Errors raised by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Source or target path does not exist
    #[error("Path '{}' not found", path.display())]
    NotFound { path: PathBuf },

    /// The OS refused access to the path
    #[error("Access denied to '{}'", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure (disk full, device error, ...)
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A manifest line did not split into digest and path
    #[error("Invalid line format: {line}")]
    MalformedManifest { line: String },

    /// Another job already holds the gate
    #[error("Server is busy: {command}")]
    Busy { command: String },
}

impl EngineError {
    /// Classify an `io::Error` raised while touching `path`.
    pub fn from_io(path: impl AsRef<Path>, err: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source: err },
            _ => Self::Io { path, source: err },
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::PermissionDenied { source, .. } | Self::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}
