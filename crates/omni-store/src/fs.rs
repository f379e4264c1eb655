use std::fs::{self, DirBuilder, File, Metadata, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use omni_types::{BackendKind, ObjectDescriptor};
use tempfile::PersistError;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::options::{BackendConfig, FilesystemConfig};
use crate::scratch::ScratchArea;
use crate::traits::{Store, WriteFilterFn};

/// Store over the local filesystem.
///
/// Operations map one-to-one onto the platform's file APIs and keep their
/// native semantics. The store holds no handles between calls.
#[derive(Debug)]
pub struct FilesystemStore {
    config: BackendConfig,
    scratch: ScratchArea,
}

impl FilesystemStore {
    pub fn new(config: FilesystemConfig) -> Self {
        let scratch = ScratchArea::new(config.scratch_dir.as_deref());
        Self {
            config: BackendConfig::Filesystem(config),
            scratch,
        }
    }

    fn ensure_parent(path: &str) -> StoreResult<()> {
        match Path::new(path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent.display().to_string(), e))
            }
            _ => Ok(()),
        }
    }
}

fn descriptor(path: &str, meta: &Metadata) -> ObjectDescriptor {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let base = if meta.is_dir() {
        ObjectDescriptor::directory(name)
    } else {
        ObjectDescriptor::file(name, meta.len())
    };
    let base = base.with_mode(permission_bits(meta));
    match meta.modified() {
        Ok(time) => base.with_modified(DateTime::<Utc>::from(time)),
        Err(_) => base,
    }
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o666
    }
}

fn dir_builder(mode: u32, recursive: bool) -> DirBuilder {
    let mut builder = DirBuilder::new();
    builder.recursive(recursive);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder
}

fn open_for_write(mode: u32) -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options
}

impl Store for FilesystemStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Filesystem
    }

    fn config(&self) -> &BackendConfig {
        &self.config
    }

    // A failed copy leaves a partial file behind; there is no rollback.
    fn create(&self, path: &str, reader: &mut dyn Read) -> StoreResult<()> {
        Self::ensure_parent(path)?;
        let mut file = File::create(path).map_err(|e| StoreError::io(path, e))?;
        io::copy(reader, &mut file).map_err(|e| StoreError::io(path, e))?;
        file.flush().map_err(|e| StoreError::io(path, e))?;
        debug!(path, "created file");
        Ok(())
    }

    fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        fs::read(path).map_err(|e| StoreError::io(path, e))
    }

    fn update(&self, path: &str, reader: &mut dyn Read) -> StoreResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        io::copy(reader, &mut file).map_err(|e| StoreError::io(path, e))?;
        file.flush().map_err(|e| StoreError::io(path, e))?;
        debug!(path, "updated file");
        Ok(())
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        let meta = fs::symlink_metadata(path).map_err(|e| StoreError::io(path, e))?;
        let removed = if meta.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        removed.map_err(|e| StoreError::io(path, e))?;
        debug!(path, "deleted");
        Ok(())
    }

    fn stat(&self, path: &str) -> StoreResult<ObjectDescriptor> {
        let meta = fs::metadata(path).map_err(|e| StoreError::io(path, e))?;
        Ok(descriptor(path, &meta))
    }

    fn mkdir(&self, path: &str, mode: u32) -> StoreResult<()> {
        dir_builder(mode, false)
            .create(path)
            .map_err(|e| StoreError::io(path, e))
    }

    fn mkdir_all(&self, path: &str, mode: u32) -> StoreResult<()> {
        dir_builder(mode, true)
            .create(path)
            .map_err(|e| StoreError::io(path, e))
    }

    fn remove_all(&self, path: &str) -> StoreResult<()> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match removed {
            Ok(()) => {
                debug!(path, "removed tree");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn write_file(&self, path: &str, data: &[u8], mode: u32) -> StoreResult<()> {
        let mut file = open_for_write(mode)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        file.write_all(data).map_err(|e| StoreError::io(path, e))
    }

    fn read_dir(&self, path: &str) -> StoreResult<Vec<ObjectDescriptor>> {
        let entries = fs::read_dir(path).map_err(|e| StoreError::io(path, e))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(path, e))?;
            let entry_path = entry.path();
            let meta = entry
                .metadata()
                .map_err(|e| StoreError::io(entry_path.display().to_string(), e))?;
            out.push(descriptor(&entry_path.to_string_lossy(), &meta));
        }
        Ok(out)
    }

    fn write_filter(&self, final_path: &str, processor: &mut WriteFilterFn<'_>) -> StoreResult<()> {
        let staged = self.scratch.stage(final_path, processor)?;
        Self::ensure_parent(final_path)?;

        if let Err(err) = staged.persist(final_path) {
            publish_by_copy(err, final_path)?;
        }
        debug!(final_path, "published write filter output");
        Ok(())
    }
}

/// Fallback when renaming the scratch file into place fails, e.g. across
/// devices. The scratch file is removed when `err` is dropped, whether or not
/// the copy succeeds.
fn publish_by_copy(err: PersistError, final_path: &str) -> StoreResult<()> {
    warn!(
        final_path,
        error = %err.error,
        "rename of scratch file failed, copying instead"
    );
    fs::copy(err.file.path(), final_path).map_err(|e| StoreError::io(final_path, e))?;
    Ok(())
}
