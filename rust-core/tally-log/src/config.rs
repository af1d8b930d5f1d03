// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Log - Consumer configuration
//
// The `consumer` field of the init object selects the variant; the
// remaining fields are variant-specific. Unknown fields are ignored so a
// binding can pass one object carrying options for several variants.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LogError, LogResult};

/// Default file name prefix.
pub const DEFAULT_NAME_PREFIX: &str = "tally_";
/// Default number of records collected before a batch is appended.
pub const DEFAULT_MAX_BATCH_LEN: u64 = 100;
/// Default projected size cap of one rotating log file (16 MiB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 16 * 1024 * 1024;
/// Default capacity of one memory-mapped backing file (2 MiB).
pub const DEFAULT_MMAP_FILE_SIZE: u64 = 2 * 1024 * 1024;

fn default_name_prefix() -> String {
    DEFAULT_NAME_PREFIX.to_string()
}

fn default_max_batch_len() -> u64 {
    DEFAULT_MAX_BATCH_LEN
}

fn default_max_file_size_bytes() -> u64 {
    DEFAULT_MAX_FILE_SIZE_BYTES
}

// ---------------------------------------------------------------------------
// ConsumerConfig
// ---------------------------------------------------------------------------

/// Selects and configures the active consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "consumer")]
pub enum ConsumerConfig {
    /// Append-only rotating flat files.
    #[serde(rename = "log")]
    Log(LogConsumerConfig),

    /// Memory-mapped fixed-capacity files.
    #[serde(rename = "mlog")]
    Mmap(MmapConsumerConfig),
}

impl ConsumerConfig {
    /// Check the selected variant's settings.
    pub fn validate(&self) -> LogResult<()> {
        match self {
            Self::Log(config) => config.validate(),
            Self::Mmap(config) => config.validate(),
        }
    }

    /// The `consumer` tag value of this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::Mmap(_) => "mlog",
        }
    }

    /// Root directory of the log files.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Log(config) => &config.path,
            Self::Mmap(config) => &config.path,
        }
    }
}

// ---------------------------------------------------------------------------
// LogConsumerConfig
// ---------------------------------------------------------------------------

/// Settings of the rotating flat-file consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConsumerConfig {
    /// Directory receiving the log files. Created if missing.
    pub path: PathBuf,

    /// Prefix of every file name.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Number of records buffered in memory before the batch is appended.
    #[serde(default = "default_max_batch_len")]
    pub max_batch_len: u64,

    /// A file is rotated before an append would push it past this size.
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,

    /// Rotate files older than this many seconds before the next append.
    #[serde(default)]
    pub rotate_interval_secs: Option<u64>,
}

impl LogConsumerConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name_prefix: default_name_prefix(),
            max_batch_len: DEFAULT_MAX_BATCH_LEN,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            rotate_interval_secs: None,
        }
    }

    pub fn validate(&self) -> LogResult<()> {
        check_path(&self.path)?;
        if self.max_batch_len == 0 {
            return Err(LogError::Config("max_batch_len must be greater than 0".into()));
        }
        if self.max_file_size_bytes == 0 {
            return Err(LogError::Config(
                "max_file_size_bytes must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn rotate_interval(&self) -> Option<Duration> {
        interval(self.rotate_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// MmapConsumerConfig
// ---------------------------------------------------------------------------

/// Settings of the memory-mapped consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MmapConsumerConfig {
    /// Directory receiving the log files. Created if missing.
    pub path: PathBuf,

    /// Prefix of every file name.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Capacity of each backing file; defaults to
    /// [`DEFAULT_MMAP_FILE_SIZE`].
    #[serde(default)]
    pub file_size: Option<u64>,

    /// Unflushed byte count that triggers a sync. `None` or `0` means only
    /// explicit flushes, rotations and close sync the mapping.
    #[serde(default)]
    pub flush_size: Option<u64>,

    /// Rotate files older than this many seconds before the next append.
    #[serde(default)]
    pub rotate_interval_secs: Option<u64>,
}

impl MmapConsumerConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name_prefix: default_name_prefix(),
            file_size: None,
            flush_size: None,
            rotate_interval_secs: None,
        }
    }

    pub fn validate(&self) -> LogResult<()> {
        check_path(&self.path)?;
        if self.file_size == Some(0) {
            return Err(LogError::Config("file_size must be greater than 0".into()));
        }
        if usize::try_from(self.capacity()).is_err() {
            return Err(LogError::Config(format!(
                "file_size {} cannot be mapped on this platform",
                self.capacity()
            )));
        }
        Ok(())
    }

    /// Effective capacity of one backing file.
    pub fn capacity(&self) -> u64 {
        self.file_size.unwrap_or(DEFAULT_MMAP_FILE_SIZE)
    }

    /// Effective sync threshold.
    pub fn flush_threshold(&self) -> Option<u64> {
        self.flush_size.filter(|&size| size > 0)
    }

    pub fn rotate_interval(&self) -> Option<Duration> {
        interval(self.rotate_interval_secs)
    }
}

fn check_path(path: &std::path::Path) -> LogResult<()> {
    if path.as_os_str().is_empty() {
        return Err(LogError::Config("path must not be empty".into()));
    }
    Ok(())
}

fn interval(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|&s| s > 0).map(Duration::from_secs)
}
