//! Uniform CRUD storage over the local filesystem and remote object stores.
//!
//! Calling code works against the [`Store`] trait and picks the backend once,
//! either explicitly through [`init`] or by inspecting a path with
//! [`storage_type`]. The same call sites then run unchanged against a local
//! directory, an S3 bucket or a GCS bucket.
//!
//! # Backends
//!
//! - [`FilesystemStore`] — native files and directories
//! - [`ObjectStoreAdapter`] — S3 and GCS buckets through `object_store`
//!
//! # Design Rules
//!
//! 1. A constructed store binds every operation; construction fails instead.
//! 2. Operations block the caller and return the backend's error with the path attached.
//! 3. Backend differences (directories, `update` of a missing file) are
//!    documented on [`Store`], not papered over.
//! 4. Only [`get_default_store`] and [`get_store`] read the process environment.

pub mod env;
pub mod error;
pub mod factory;
pub mod fs;
pub mod object;
pub mod options;
pub mod selector;
pub mod traits;

mod runtime;
mod scratch;

// Re-export primary types at crate root for ergonomic imports.
pub use env::{
    default_kind_from_env, default_request, get_default_store, get_store, get_store_with,
    options_from_env, store_request, EnvVars,
};
pub use error::{StoreError, StoreResult};
pub use factory::init;
pub use fs::FilesystemStore;
pub use object::ObjectStoreAdapter;
pub use options::{
    BackendConfig, FilesystemConfig, GcsConfig, S3Config, StoreOptions, DEFAULT_LIST_PAGE_SIZE,
};
pub use selector::{bucket_from_uri, storage_type, ObjectLocation};
pub use traits::{Store, WriteFilterFn};

pub use omni_types::{BackendKind, ObjectDescriptor};
