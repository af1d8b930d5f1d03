// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Log - Log directory reader
//
// Read-side helpers for uploaders and tests: enumerate finalized files in
// creation order and decode their records. In-progress files are listed
// separately and never mixed into the finalized set.

use std::fs;
use std::path::{Path, PathBuf};

use tally_event::{Map, Value};
use tracing::debug;

use crate::error::{LogError, LogResult};
use crate::naming::{parse_final_name, parse_in_progress_name};

/// A log file found in a consumer directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileInfo {
    pub path: PathBuf,
    /// Creation time embedded in the file name.
    pub timestamp_ms: i64,
    /// Per-instance sequence number embedded in the file name.
    pub sequence: u64,
    /// Size on disk in bytes.
    pub size: u64,
}

/// List finalized files of `prefix` in `dir`, oldest first.
pub fn list_log_files(dir: &Path, prefix: &str) -> LogResult<Vec<LogFileInfo>> {
    list_matching(dir, |name| parse_final_name(prefix, name))
}

/// List files of `prefix` in `dir` that are still being written, oldest first.
pub fn list_in_progress(dir: &Path, prefix: &str) -> LogResult<Vec<LogFileInfo>> {
    list_matching(dir, |name| parse_in_progress_name(prefix, name))
}

fn list_matching<F>(dir: &Path, parse: F) -> LogResult<Vec<LogFileInfo>>
where
    F: Fn(&str) -> Option<(i64, u64)>,
{
    let mut files = Vec::new();
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let file_name = dir_entry.file_name();
        let Some((timestamp_ms, sequence)) = parse(&file_name.to_string_lossy()) else {
            continue;
        };
        let metadata = dir_entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        files.push(LogFileInfo {
            path: dir_entry.path(),
            timestamp_ms,
            sequence,
            size: metadata.len(),
        });
    }
    files.sort_by_key(|f| (f.timestamp_ms, f.sequence));
    Ok(files)
}

/// Decode every record of a log file.
///
/// Blank lines and zero padding (the unwritten tail of a mapped file) are
/// skipped. A line that is not a JSON object yields
/// [`LogError::CorruptRecord`].
pub fn read_records(path: &Path) -> LogResult<Vec<Map>> {
    let data = fs::read(path)?;
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());

    let mut records = Vec::new();
    for (index, line) in data[..end].split(|&b| b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let corrupt = |reason: String| LogError::CorruptRecord {
            path: path.display().to_string(),
            line: index + 1,
            reason,
        };
        let value: Value = serde_json::from_slice(line).map_err(|e| corrupt(e.to_string()))?;
        match value {
            Value::Map(map) => records.push(map),
            other => return Err(corrupt(format!("expected a map, found {}", other.kind()))),
        }
    }

    debug!(path = %path.display(), records = records.len(), "Read log file");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{final_name, in_progress_name};
    use tempfile::TempDir;

    #[test]
    fn test_list_orders_by_timestamp_then_sequence() {
        let dir = TempDir::new().unwrap();
        for (ts, seq) in [(20, 0), (10, 1), (10, 0)] {
            fs::write(dir.path().join(final_name("p_", ts, seq)), b"{}\n").unwrap();
        }
        fs::write(dir.path().join(in_progress_name("p_", 30, 2)), b"{}\n").unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        let files = list_log_files(dir.path(), "p_").unwrap();
        let order: Vec<(i64, u64)> = files.iter().map(|f| (f.timestamp_ms, f.sequence)).collect();
        assert_eq!(order, vec![(10, 0), (10, 1), (20, 0)]);
        assert_eq!(files[0].size, 3);

        let pending = list_in_progress(dir.path(), "p_").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sequence, 2);
    }

    #[test]
    fn test_read_skips_blank_lines_and_padding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p_1_0");
        let mut data = b"{\"a\":1}\n\n{\"b\":\"x\"}\n".to_vec();
        data.extend_from_slice(&[0u8; 16]);
        fs::write(&path, data).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"].as_i64(), Some(1));
        assert_eq!(records[1]["b"].as_str(), Some("x"));
    }

    #[test]
    fn test_read_reports_corrupt_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p_1_0");
        fs::write(&path, b"{\"a\":1}\n[1,2]\n").unwrap();

        match read_records(&path) {
            Err(LogError::CorruptRecord { line, reason, .. }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("array"));
            }
            other => panic!("expected corrupt record, got {other:?}"),
        }
    }
}
