//! Store options and the typed per-backend configuration resolved from them.
//!
//! [`StoreOptions`] is the loose, mergeable form callers build (by hand, from a
//! TOML file, or from the environment at the composition root). The factory
//! resolves it into a [`BackendConfig`] for the requested backend, which is
//! where invalid combinations, such as a remote store without a bucket, are
//! rejected.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use omni_types::BackendKind;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Maximum number of keys fetched per listing page.
pub const DEFAULT_LIST_PAGE_SIZE: usize = 1000;

/// Options accepted by the store factory.
///
/// Every field is optional; backends ignore the options that do not apply to
/// them. Unset fields fall back to backend defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    /// Bucket name. Required for S3 and GCS.
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    /// Allow plain HTTP endpoints.
    pub allow_http: Option<bool>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Let the object store client pick up its SDK's ambient configuration.
    pub use_ambient_config: Option<bool>,
    /// Service account key file (GCS).
    pub credentials_file: Option<PathBuf>,
    /// Client-level deadline applied to every remote request.
    pub request_timeout_secs: Option<u64>,
    /// Keys fetched per listing page during `remove_all`.
    pub list_page_size: Option<usize>,
    /// Directory for `write_filter` temp files. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_list_page_size(mut self, size: usize) -> Self {
        self.list_page_size = Some(size);
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Parse options from a TOML document.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| StoreError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Fill every unset field from `fallback`. Fields set on `self` win.
    pub fn or(self, fallback: StoreOptions) -> Self {
        Self {
            bucket: self.bucket.or(fallback.bucket),
            region: self.region.or(fallback.region),
            endpoint: self.endpoint.or(fallback.endpoint),
            allow_http: self.allow_http.or(fallback.allow_http),
            access_key_id: self.access_key_id.or(fallback.access_key_id),
            secret_access_key: self.secret_access_key.or(fallback.secret_access_key),
            session_token: self.session_token.or(fallback.session_token),
            use_ambient_config: self.use_ambient_config.or(fallback.use_ambient_config),
            credentials_file: self.credentials_file.or(fallback.credentials_file),
            request_timeout_secs: self.request_timeout_secs.or(fallback.request_timeout_secs),
            list_page_size: self.list_page_size.or(fallback.list_page_size),
            scratch_dir: self.scratch_dir.or(fallback.scratch_dir),
        }
    }

    fn bucket_for(&self, kind: BackendKind) -> StoreResult<String> {
        self.bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .ok_or(StoreError::BucketNotDefined(kind))
    }

    fn page_size(&self) -> usize {
        self.list_page_size
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_LIST_PAGE_SIZE)
    }
}

/// Configuration of a filesystem store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilesystemConfig {
    pub scratch_dir: Option<PathBuf>,
}

/// Configuration of an S3 store.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub allow_http: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub use_ambient_config: bool,
    pub request_timeout: Option<Duration>,
    pub list_page_size: usize,
    pub scratch_dir: Option<PathBuf>,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("allow_http", &self.allow_http)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("use_ambient_config", &self.use_ambient_config)
            .field("request_timeout", &self.request_timeout)
            .field("list_page_size", &self.list_page_size)
            .finish()
    }
}

/// Configuration of a Google Cloud Storage store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcsConfig {
    pub bucket: String,
    pub credentials_file: Option<PathBuf>,
    pub use_ambient_config: bool,
    pub request_timeout: Option<Duration>,
    pub list_page_size: usize,
    pub scratch_dir: Option<PathBuf>,
}

/// Typed configuration of a constructed store, one variant per backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendConfig {
    Filesystem(FilesystemConfig),
    S3(S3Config),
    Gcs(GcsConfig),
}

impl BackendConfig {
    /// Resolve options for `kind`, rejecting combinations the backend
    /// cannot work with.
    pub fn resolve(kind: BackendKind, options: StoreOptions) -> StoreResult<Self> {
        let request_timeout = options.request_timeout_secs.map(Duration::from_secs);
        match kind {
            BackendKind::Unsupported => Err(StoreError::Unsupported(kind)),
            BackendKind::Filesystem => Ok(Self::Filesystem(FilesystemConfig {
                scratch_dir: options.scratch_dir,
            })),
            BackendKind::S3 => Ok(Self::S3(S3Config {
                bucket: options.bucket_for(kind)?,
                list_page_size: options.page_size(),
                region: options.region,
                endpoint: options.endpoint,
                allow_http: options.allow_http.unwrap_or(false),
                access_key_id: options.access_key_id,
                secret_access_key: options.secret_access_key,
                session_token: options.session_token,
                use_ambient_config: options.use_ambient_config.unwrap_or(false),
                request_timeout,
                scratch_dir: options.scratch_dir,
            })),
            BackendKind::Gcs => Ok(Self::Gcs(GcsConfig {
                bucket: options.bucket_for(kind)?,
                list_page_size: options.page_size(),
                credentials_file: options.credentials_file,
                use_ambient_config: options.use_ambient_config.unwrap_or(false),
                request_timeout,
                scratch_dir: options.scratch_dir,
            })),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Filesystem(_) => BackendKind::Filesystem,
            Self::S3(_) => BackendKind::S3,
            Self::Gcs(_) => BackendKind::Gcs,
        }
    }

    /// Bucket name of a remote store.
    pub fn bucket(&self) -> Option<&str> {
        match self {
            Self::Filesystem(_) => None,
            Self::S3(c) => Some(&c.bucket),
            Self::Gcs(c) => Some(&c.bucket),
        }
    }

    pub fn list_page_size(&self) -> usize {
        match self {
            Self::Filesystem(_) => DEFAULT_LIST_PAGE_SIZE,
            Self::S3(c) => c.list_page_size,
            Self::Gcs(c) => c.list_page_size,
        }
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        match self {
            Self::Filesystem(c) => c.scratch_dir.as_deref(),
            Self::S3(c) => c.scratch_dir.as_deref(),
            Self::Gcs(c) => c.scratch_dir.as_deref(),
        }
    }
}
