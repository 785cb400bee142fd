use std::path::PathBuf;

/// Errors that can occur in file store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No stored file has this name.
    #[error("file '{name}' not found")]
    NotFound { name: String },

    /// The storage root is missing or is not a directory.
    #[error("storage root {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Disk I/O failed while accessing a stored file.
    #[error("{name}: {source}")]
    Io {
        name: String,
        source: std::io::Error,
    },

    /// Disk I/O failed on the storage root itself.
    #[error("storage root {}: {source}", path.display())]
    Root {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(name: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return StoreError::NotFound {
                name: name.to_string(),
            };
        }
        StoreError::Io {
            name: name.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
