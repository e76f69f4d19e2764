//! Run file lifecycle.
//!
//! Run files are plain sequential streams with no header: the schema and
//! codec travel in memory alongside the `RunFile`, never inside it. The only
//! other metadata (record count, byte length) is kept in `RunMeta`.
//!
//! Naming: `<sort id>-<run id>-<random>.run` inside the scratch directory,
//! created exclusively. A `RunFile` owns its path; dropping it deletes the
//! file, so every exit path (success, error, early abandonment) cleans up.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use spillsort_core::config::Compression;
use spillsort_core::id::{RunId, SortId};
use tempfile::TempPath;

use crate::error::{Result, RunError};

pub const RUN_SUFFIX: &str = ".run";

/// Where one sort session puts its runs.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
    sort_id: SortId,
}

impl ScratchDir {
    /// Create (if needed) the scratch directory for a sort session.
    pub fn new(root: impl Into<PathBuf>, sort_id: SortId) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| RunError::Scratch {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root, sort_id })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sort_id(&self) -> SortId {
        self.sort_id
    }

    /// Allocate a fresh, exclusively created run file.
    pub(crate) fn create_run_file(&self, run_id: RunId) -> Result<(File, TempPath)> {
        let prefix = format!("{}-{}-", self.sort_id, run_id);
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(RUN_SUFFIX)
            .tempfile_in(&self.root)
            .map_err(|source| RunError::Scratch {
                path: self.root.clone(),
                source,
            })?;
        Ok(file.into_parts())
    }
}

/// What the writer knows about a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMeta {
    pub run_id: RunId,
    pub records: u64,
    pub bytes: u64,
    pub compression: Compression,
}

/// A finished run on disk. Owns the file: dropping deletes it.
#[derive(Debug)]
pub struct RunFile {
    path: TempPath,
    meta: RunMeta,
}

impl RunFile {
    pub(crate) fn new(path: TempPath, meta: RunMeta) -> Self {
        Self { path, meta }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &RunMeta {
        &self.meta
    }

    pub fn run_id(&self) -> RunId {
        self.meta.run_id
    }

    pub(crate) fn open(&self) -> Result<File> {
        File::open(&self.path).map_err(RunError::io("open run"))
    }

    /// Delete the file now, reporting failure instead of swallowing it.
    pub fn delete(self) -> Result<()> {
        self.path.close().map_err(RunError::io("delete run"))
    }
}
