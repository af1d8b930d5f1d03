// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Log - File naming and rotation slots
//
// A finalized log file is named `{name_prefix}{timestamp}_{sequence}`, where
// `timestamp` is the Unix time in milliseconds at which the file was opened
// and `sequence` counts files opened by one consumer instance, starting at
// 0. While a file is being written it carries an extra `.tmp` extension so
// an uploader scanning the directory never picks it up half-written.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::LogResult;

/// Extension appended to files that are still being written.
pub const IN_PROGRESS_EXTENSION: &str = "tmp";

/// Build the final file name for the given slot coordinates.
///
/// Format: `p_1718000000000_3`
pub fn final_name(prefix: &str, timestamp_ms: i64, sequence: u64) -> String {
    format!("{prefix}{timestamp_ms}_{sequence}")
}

/// Build the in-progress file name for the given slot coordinates.
///
/// Format: `p_1718000000000_3.tmp`
pub fn in_progress_name(prefix: &str, timestamp_ms: i64, sequence: u64) -> String {
    format!(
        "{}.{IN_PROGRESS_EXTENSION}",
        final_name(prefix, timestamp_ms, sequence)
    )
}

/// Parse `(timestamp_ms, sequence)` from a final file name.
///
/// Returns `None` if the name does not belong to `prefix` or is malformed.
pub fn parse_final_name(prefix: &str, name: &str) -> Option<(i64, u64)> {
    let rest = name.strip_prefix(prefix)?;
    let (timestamp, sequence) = rest.rsplit_once('_')?;
    if !is_digits(timestamp) || !is_digits(sequence) {
        return None;
    }
    Some((timestamp.parse().ok()?, sequence.parse().ok()?))
}

/// Parse `(timestamp_ms, sequence)` from an in-progress file name.
pub fn parse_in_progress_name(prefix: &str, name: &str) -> Option<(i64, u64)> {
    let stem = name.strip_suffix(&format!(".{IN_PROGRESS_EXTENSION}"))?;
    parse_final_name(prefix, stem)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// FileSlot
// ---------------------------------------------------------------------------

/// One allocated log file: where it is written and where it ends up.
#[derive(Debug, Clone)]
pub struct FileSlot {
    /// Per-instance sequence number.
    pub sequence: u64,
    /// Creation time embedded in the name.
    pub timestamp_ms: i64,
    /// Path while the file is being written.
    pub in_progress: PathBuf,
    /// Path after finalization.
    pub finalized: PathBuf,
    opened_at: Instant,
}

impl FileSlot {
    /// Returns `true` if the slot has been open for at least `interval`.
    pub fn is_expired(&self, interval: Option<Duration>) -> bool {
        interval.is_some_and(|limit| self.opened_at.elapsed() >= limit)
    }

    /// Rename the in-progress file to its final name.
    pub fn finalize(&self) -> LogResult<()> {
        fs::rename(&self.in_progress, &self.finalized)?;
        info!(
            path = %self.finalized.display(),
            sequence = self.sequence,
            "Finalized log file"
        );
        Ok(())
    }

    /// Remove an in-progress file that never received a record.
    pub fn discard(&self) -> LogResult<()> {
        fs::remove_file(&self.in_progress)?;
        debug!(path = %self.in_progress.display(), "Removed empty log file");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LogNamer
// ---------------------------------------------------------------------------

/// Hands out file slots for one consumer instance.
///
/// Sequence numbers increase by one per slot and are never reused, whether
/// the previous file was rotated for size, for age, or closed.
#[derive(Debug)]
pub struct LogNamer {
    dir: PathBuf,
    prefix: String,
    next_sequence: u64,
    last_timestamp_ms: i64,
}

impl LogNamer {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            next_sequence: 0,
            last_timestamp_ms: i64::MIN,
        }
    }

    /// Allocate the next slot.
    ///
    /// If a file with the chosen final or in-progress name already exists
    /// (a previous instance wrote in the same millisecond), the timestamp
    /// moves forward until both names are free.
    pub fn next_slot(&mut self) -> FileSlot {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let mut timestamp_ms = Utc::now().timestamp_millis().max(self.last_timestamp_ms);
        loop {
            let finalized = self.dir.join(final_name(&self.prefix, timestamp_ms, sequence));
            let in_progress = self
                .dir
                .join(in_progress_name(&self.prefix, timestamp_ms, sequence));
            if !finalized.exists() && !in_progress.exists() {
                self.last_timestamp_ms = timestamp_ms;
                return FileSlot {
                    sequence,
                    timestamp_ms,
                    in_progress,
                    finalized,
                    opened_at: Instant::now(),
                };
            }
            timestamp_ms += 1;
        }
    }

    /// The sequence number the next slot will receive.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Finalize in-progress files left behind by an instance that did not close
/// cleanly.
///
/// Each file is cut back to its last complete line (dropping unused mapped
/// capacity and any record torn by the crash). Files with no complete line
/// are removed; the rest are renamed to their final names. Returns the paths
/// of the recovered files.
pub fn recover_in_progress(dir: &Path, prefix: &str) -> LogResult<Vec<PathBuf>> {
    let mut recovered = Vec::new();

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let file_name = dir_entry.file_name();
        let name = file_name.to_string_lossy();

        let Some((timestamp_ms, sequence)) = parse_in_progress_name(prefix, &name) else {
            continue;
        };

        let path = dir_entry.path();
        let data = fs::read(&path)?;
        let content_end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        let valid_len = data[..content_end]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);

        if valid_len == 0 {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "Removed empty orphaned log file");
            continue;
        }

        if valid_len < data.len() {
            let file = fs::OpenOptions::new().write(true).open(&path)?;
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }

        let target = dir.join(final_name(prefix, timestamp_ms, sequence));
        if target.exists() {
            warn!(
                path = %path.display(),
                target = %target.display(),
                "Cannot recover orphaned log file: final name already taken"
            );
            continue;
        }
        fs::rename(&path, &target)?;
        info!(
            path = %target.display(),
            bytes = valid_len,
            dropped = data.len() - valid_len,
            "Recovered orphaned log file"
        );
        recovered.push(target);
    }

    recovered.sort();
    Ok(recovered)
}
