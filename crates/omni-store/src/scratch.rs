use std::io::Write;
use std::path::{Path, PathBuf};

use omni_types::base_name;
use tempfile::{Builder, NamedTempFile};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::WriteFilterFn;

/// Where `write_filter` stages its output before publishing it.
///
/// Staged files are [`NamedTempFile`]s: whichever way the caller leaves
/// (publish, processor failure, publish failure, panic) the file is removed
/// when the handle is dropped.
#[derive(Clone, Debug, Default)]
pub(crate) struct ScratchArea {
    dir: Option<PathBuf>,
}

impl ScratchArea {
    /// Scratch area in `dir`, or the system temp directory.
    pub fn new(dir: Option<&Path>) -> Self {
        Self {
            dir: dir.map(Path::to_path_buf),
        }
    }

    /// Create a uniquely named scratch file for `final_path` and let
    /// `processor` fill it. The returned file is flushed and ready to publish.
    pub fn stage(
        &self,
        final_path: &str,
        processor: &mut WriteFilterFn<'_>,
    ) -> StoreResult<NamedTempFile> {
        let prefix = format!("{}.", base_name(final_path));
        let mut builder = Builder::new();
        builder.prefix(&prefix);
        let created = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut staged = created.map_err(|e| StoreError::io(self.location(), e))?;

        processor(staged.as_file_mut()).map_err(|source| StoreError::Filter {
            path: final_path.to_string(),
            source,
        })?;
        staged
            .as_file_mut()
            .flush()
            .map_err(|e| StoreError::io(staged.path().display().to_string(), e))?;

        debug!(scratch = %staged.path().display(), final_path, "staged write filter output");
        Ok(staged)
    }

    fn location(&self) -> String {
        match &self.dir {
            Some(dir) => dir.display().to_string(),
            None => "system temp dir".to_string(),
        }
    }
}
