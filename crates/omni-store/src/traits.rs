use std::fmt;
use std::fs::File;
use std::io::{self, Read};

use omni_types::{BackendKind, ObjectDescriptor};

use crate::error::StoreResult;
use crate::options::BackendConfig;

/// Processing function handed to [`Store::write_filter`].
///
/// It receives the scratch file open for writing and must leave the complete
/// content in it. Returning an error aborts the write before anything is
/// published.
pub type WriteFilterFn<'a> = dyn FnMut(&mut File) -> io::Result<()> + 'a;

/// CRUD store over one storage backend.
///
/// The operation names mirror the usual filesystem utilities so that call
/// sites written against one backend port to another with nothing but a
/// different store. Paths are `/`-separated; for object stores they are keys
/// within the store's bucket, for the filesystem they are native paths.
///
/// Every operation blocks the calling thread until the backend answers and
/// surfaces the backend's error unchanged (with the path added as context).
/// There is no retry, caching or locking at this layer; callers that issue
/// operations concurrently must serialize them or use separate stores.
///
/// Backends differ where their storage models differ, and the differences are
/// part of the contract:
///
/// - `update` on the filesystem fails when the file does not exist; on object
///   stores it is identical to `create` and creates the key.
/// - `mkdir` and `mkdir_all` on object stores succeed without doing anything.
///   A successful `mkdir` is not proof that a directory is addressable.
/// - Object-store descriptors never report `is_dir`.
pub trait Store: Send + Sync + fmt::Debug {
    /// Backend this store is bound to.
    fn kind(&self) -> BackendKind;

    /// The store's own configuration.
    fn config(&self) -> &BackendConfig;

    /// Create (or replace) `path` with everything read from `reader`.
    fn create(&self, path: &str, reader: &mut dyn Read) -> StoreResult<()>;

    /// Read the full content of `path`.
    fn read(&self, path: &str) -> StoreResult<Vec<u8>>;

    /// Replace the content of `path` with everything read from `reader`.
    fn update(&self, path: &str, reader: &mut dyn Read) -> StoreResult<()>;

    /// Delete a single file or object.
    fn delete(&self, path: &str) -> StoreResult<()>;

    /// Metadata for exactly `path`.
    fn stat(&self, path: &str) -> StoreResult<ObjectDescriptor>;

    /// Create one directory level with permission bits `mode`.
    fn mkdir(&self, path: &str, mode: u32) -> StoreResult<()>;

    /// Create `path` and every missing parent with permission bits `mode`.
    fn mkdir_all(&self, path: &str, mode: u32) -> StoreResult<()>;

    /// Remove `path` and everything beneath it. Succeeds if nothing is there.
    fn remove_all(&self, path: &str) -> StoreResult<()>;

    /// Write `data` to `path`, creating or truncating it.
    fn write_file(&self, path: &str, data: &[u8], mode: u32) -> StoreResult<()>;

    /// Metadata of the entries directly beneath `path`, in backend order.
    fn read_dir(&self, path: &str) -> StoreResult<Vec<ObjectDescriptor>>;

    /// Run `processor` against a scratch file, then publish the result at
    /// `final_path`.
    ///
    /// The scratch file lives outside the store and is removed on every exit
    /// path. Nothing appears at `final_path` unless `processor` succeeds.
    fn write_filter(&self, final_path: &str, processor: &mut WriteFilterFn<'_>) -> StoreResult<()>;

    /// Same as [`Store::delete`].
    fn remove(&self, path: &str) -> StoreResult<()> {
        self.delete(path)
    }

    /// Same as [`Store::read`].
    fn read_file(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.read(path)
    }

    /// Returns `true` if `path` exists and is a directory.
    fn is_dir(&self, path: &str) -> bool {
        self.stat(path).map(|d| d.is_dir).unwrap_or(false)
    }

    /// Returns `true` if `path` exists and is not a directory.
    fn is_file(&self, path: &str) -> bool {
        self.stat(path).map(|d| !d.is_dir).unwrap_or(false)
    }

    /// Names of the entries directly beneath `dir` whose name ends with `ext`.
    fn find_by_ext(&self, dir: &str, ext: &str) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self
            .read_dir(dir)?
            .into_iter()
            .filter(|d| d.has_extension(ext))
            .map(|d| d.name)
            .collect();
        names.sort();
        Ok(names)
    }
}
