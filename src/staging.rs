//! Staged writes: every new file content goes to a temporary sibling first and
//! only replaces its destination when the whole batch is committed.

use std::io::Write;
use std::mem;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};

use crate::column::encode_column;
use crate::error::{Error, Result};
use crate::value::Value;

/// One fully written temporary file waiting to be renamed onto `final_path`.
#[derive(Debug)]
pub struct StagedWrite {
    temp_path: TempPath,
    final_path: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }
}

/// Accumulates [StagedWrite]s for one statement.
///
/// Final files are never touched before [StagedWriter::commit]. Dropping an
/// uncommitted writer deletes every temporary file, which is how a failed
/// statement rolls back.
///
/// # Example
/// ```
/// # use coldb::{Value, staging::StagedWriter};
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("age.json");
///
/// let mut writer = StagedWriter::new();
/// writer.stage(&path, "age", &[Value::Int(1)]).unwrap();
/// assert!(!path.exists());
///
/// assert_eq!(writer.commit().unwrap(), 1);
/// assert!(path.exists());
/// ```
#[derive(Debug, Default)]
pub struct StagedWriter {
    staged: Vec<StagedWrite>,
}

impl StagedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn staged(&self) -> &[StagedWrite] {
        &self.staged
    }

    /// Stages the complete new content of column `name`.
    ///
    /// # Errors
    /// Returns [Error::Io] if the temporary file cannot be created, written or synced.
    pub fn stage(&mut self, final_path: &Path, name: &str, values: &[Value]) -> Result<()> {
        let bytes = encode_column(name, values)?;
        self.stage_bytes(final_path, &bytes)
    }

    /// Stages arbitrary bytes for `final_path`, written in the same directory so
    /// the later rename never crosses a filesystem.
    pub fn stage_bytes(&mut self, final_path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = final_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut temp = Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| Error::io(dir, e))?;
        temp.write_all(bytes)
            .and_then(|_| temp.flush())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| Error::io(temp.path(), e))?;

        let temp_path = temp.into_temp_path();
        log::debug!("staged {:?} for {:?}", &*temp_path, final_path);
        self.staged.push(StagedWrite {
            temp_path,
            final_path: final_path.to_path_buf(),
        });
        Ok(())
    }

    /// Renames every staged file onto its destination and returns how many were
    /// committed.
    ///
    /// The renames are independent: if one fails, the files already renamed
    /// stay in place and the remaining temporary files are deleted.
    pub fn commit(mut self) -> Result<usize> {
        let staged = mem::take(&mut self.staged);
        let count = staged.len();
        for write in staged {
            let StagedWrite {
                temp_path,
                final_path,
            } = write;
            // the remaining TempPaths are dropped (and deleted) with the iterator
            temp_path
                .persist(&final_path)
                .map_err(|e| Error::io(&final_path, e.error))?;
            log::debug!("committed {final_path:?}");
        }
        Ok(count)
    }

    /// Deletes every staged file without touching any destination.
    pub fn rollback(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        for write in self.staged.drain(..) {
            log::debug!("discarding staged file for {:?}", write.final_path);
            if let Err(e) = write.temp_path.close() {
                log::warn!("failed to remove staged file: {e}");
            }
        }
    }
}

impl Drop for StagedWriter {
    fn drop(&mut self) {
        self.discard();
    }
}
