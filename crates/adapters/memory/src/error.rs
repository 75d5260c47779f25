//! Adapter-specific error type wrapping IO and parse errors.

use roomstate_domain::error::RoomStateError;

/// Errors originating from the in-memory adapters.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading a definitions file failed.
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A definitions file is not valid TOML for the expected shape.
    #[error("failed to parse {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl From<StorageError> for RoomStateError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
