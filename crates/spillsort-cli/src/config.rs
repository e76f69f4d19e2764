//! YAML overlay for `SortConfig`.
//!
//! Only the keys present in the file override what the environment set;
//! command-line flags are applied afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spillsort_core::config::{Compression, MergeStrategy, SortConfig};

use crate::error::CliError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub batch_size: Option<usize>,
    pub mem_cap_bytes: Option<usize>,
    pub scratch_dir: Option<PathBuf>,
    pub read_buffer_bytes: Option<usize>,
    pub write_buffer_bytes: Option<usize>,
    pub compression: Option<Compression>,
    pub merge_strategy: Option<MergeStrategy>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, CliError> {
        Ok(serde_yaml::from_str(text)?)
    }
}

pub fn apply_config_file(cfg: &mut SortConfig, doc: &ConfigFile) {
    if let Some(v) = doc.batch_size {
        cfg.batch_size = v;
    }
    if let Some(v) = doc.mem_cap_bytes {
        cfg.mem_cap_bytes = Some(v);
    }
    if let Some(dir) = &doc.scratch_dir {
        cfg.scratch_dir = dir.clone();
    }
    if let Some(v) = doc.read_buffer_bytes {
        cfg.read_buffer_bytes = v;
    }
    if let Some(v) = doc.write_buffer_bytes {
        cfg.write_buffer_bytes = v;
    }
    if let Some(v) = doc.compression {
        cfg.compression = v;
    }
    if let Some(v) = doc.merge_strategy {
        cfg.merge_strategy = v;
    }
}
