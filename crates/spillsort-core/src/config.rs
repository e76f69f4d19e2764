//! Sort configuration that callers can serialize/deserialize.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stream compression applied to whole run files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zstd,
    Lz4,
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Compression::None),
            "zstd" => Ok(Compression::Zstd),
            "lz4" => Ok(Compression::Lz4),
            other => Err(Error::Config(format!("unknown compression '{other}'"))),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compression::None => "none",
            Compression::Zstd => "zstd",
            Compression::Lz4 => "lz4",
        })
    }
}

/// How the merger picks the minimum across open runs. Both strategies emit
/// the same sequence, ties included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Scan every open run per record: O(runs) per step.
    #[default]
    Linear,
    /// Binary min-heap keyed by (record, run index): O(log runs) per step.
    Heap,
}

impl FromStr for MergeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "scan" => Ok(MergeStrategy::Linear),
            "heap" => Ok(MergeStrategy::Heap),
            other => Err(Error::Config(format!("unknown merge strategy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Maximum records held in memory before a run is spilled.
    pub batch_size: usize,

    /// Optional byte cap on the in-memory batch. When set, a batch is
    /// spilled as soon as the next record would not fit.
    pub mem_cap_bytes: Option<usize>,

    /// Directory for run files. Created on demand; never removed.
    pub scratch_dir: PathBuf,

    /// Buffer capacity for each open run reader.
    pub read_buffer_bytes: usize,

    /// Buffer capacity for the run writer.
    pub write_buffer_bytes: usize,

    pub compression: Compression,

    pub merge_strategy: MergeStrategy,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            batch_size: 100_000,
            mem_cap_bytes: None,
            scratch_dir: std::env::temp_dir().join("spillsort"),
            read_buffer_bytes: 64 * 1024,
            write_buffer_bytes: 64 * 1024,
            compression: Compression::None,
            merge_strategy: MergeStrategy::Linear,
        }
    }
}

impl SortConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `SPILLSORT_BATCH_SIZE`: records per run
    /// - `SPILLSORT_MEM_CAP_BYTES`: byte cap on the in-memory batch
    /// - `SPILLSORT_SCRATCH_DIR`: run file directory
    /// - `SPILLSORT_READ_BUFFER_BYTES` / `SPILLSORT_WRITE_BUFFER_BYTES`
    /// - `SPILLSORT_COMPRESSION`: `none`, `zstd` or `lz4`
    /// - `SPILLSORT_MERGE_STRATEGY`: `linear` or `heap`
    ///
    /// Values that fail to parse are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("SPILLSORT_BATCH_SIZE").and_then(|s| s.parse().ok()) {
            cfg.batch_size = v;
        }

        if let Some(v) = lookup("SPILLSORT_MEM_CAP_BYTES").and_then(|s| s.parse().ok()) {
            cfg.mem_cap_bytes = Some(v);
        }

        if let Some(s) = lookup("SPILLSORT_SCRATCH_DIR") {
            cfg.scratch_dir = PathBuf::from(s);
        }

        if let Some(v) = lookup("SPILLSORT_READ_BUFFER_BYTES").and_then(|s| s.parse().ok()) {
            cfg.read_buffer_bytes = v;
        }

        if let Some(v) = lookup("SPILLSORT_WRITE_BUFFER_BYTES").and_then(|s| s.parse().ok()) {
            cfg.write_buffer_bytes = v;
        }

        if let Some(v) = lookup("SPILLSORT_COMPRESSION").and_then(|s| s.parse().ok()) {
            cfg.compression = v;
        }

        if let Some(v) = lookup("SPILLSORT_MERGE_STRATEGY").and_then(|s| s.parse().ok()) {
            cfg.merge_strategy = v;
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.mem_cap_bytes == Some(0) {
            return Err(Error::Config("mem_cap_bytes must be positive".into()));
        }
        if self.read_buffer_bytes == 0 || self.write_buffer_bytes == 0 {
            return Err(Error::Config("io buffer sizes must be positive".into()));
        }
        if self.scratch_dir.as_os_str().is_empty() {
            return Err(Error::Config("scratch_dir must not be empty".into()));
        }
        Ok(())
    }
}
