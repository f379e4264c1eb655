use std::io;
use std::path::PathBuf;

use omni_types::BackendKind;

/// Errors from store construction and store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The factory was asked for a backend it has no adapter for.
    #[error("storage backend not supported: {0}")]
    Unsupported(BackendKind),

    /// A remote backend was configured without a bucket name.
    #[error("bucket not defined for {0} store")]
    BucketNotDefined(BackendKind),

    /// The remote client session could not be created.
    #[error("failed to create {backend} client session")]
    Session {
        backend: BackendKind,
        #[source]
        source: object_store::Error,
    },

    /// The runtime driving the remote client could not be started.
    #[error("failed to start I/O runtime: {0}")]
    Runtime(#[source] io::Error),

    /// A configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// No object exists at the given key.
    #[error("{path} not found")]
    NotFound { path: String },

    /// The path cannot be used as a key or location for this store.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// I/O error from the local filesystem.
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The caller's write filter failed; nothing was published.
    #[error("write filter for {path} failed: {source}")]
    Filter {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A deleted key keeps reappearing in listings, e.g. a folder marker
    /// whose key the backend cannot address.
    #[error("{path} is still listed after being deleted")]
    Undeletable { path: String },

    /// Error returned by an object store call.
    #[error("{backend} error for {path}: {source}")]
    Backend {
        backend: BackendKind,
        path: String,
        #[source]
        source: object_store::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the error means the file or object does not exist,
    /// whichever backend reported it.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            Self::Backend { source, .. } => matches!(source, object_store::Error::NotFound { .. }),
            _ => false,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
