//! Error types for the manifest crate.

use meteo_core::{Error, ErrorCode};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for manifest operations.
pub type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl ManifestError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        ManifestError::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Core error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ManifestError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorCode::FileNotFound
            }
            ManifestError::Io { .. } => ErrorCode::IoError,
            ManifestError::Syntax { .. } => ErrorCode::InvalidFormat,
            ManifestError::Toml(_) => ErrorCode::Internal,
        }
    }
}

impl From<ManifestError> for Error {
    fn from(err: ManifestError) -> Self {
        let code = err.code();
        let mut out = Error::new(code, err.to_string());
        if code == ErrorCode::InvalidFormat {
            out = out.with_suggestion("Manifest lines must be `[section]`, `key = value` or comments");
        }
        out.with_source(err)
    }
}
