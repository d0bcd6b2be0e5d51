use std::path::PathBuf;

use thiserror::Error;

/// Result type for tracking transform operations
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Failures of the transform and its manifest bookkeeping.
///
/// None of these abort a build: the session turns every one of them into a
/// [`crate::Diagnostic`] and falls back to the untransformed source or skips
/// the write.
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("failed to emit {file}: {source}")]
    Emit {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid tracking config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("transform panicked on {file}: {message}")]
    Panicked { file: String, message: String },
}

impl TrackingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrackingError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        TrackingError::Json {
            path: path.into(),
            source,
        }
    }
}
