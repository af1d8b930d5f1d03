// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Log - Error types
//
// Everything a consumer can report: filesystem failures, bad configuration,
// writes after close, and the degraded state a failed rotation leaves
// behind.

use thiserror::Error;

/// Errors that can occur while writing, flushing, or rotating log files.
#[derive(Debug, Error)]
pub enum LogError {
    /// An I/O error occurred on a log file or its directory (permission
    /// denied, disk full, path missing).
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The consumer configuration is unusable.
    #[error("invalid consumer configuration: {0}")]
    Config(String),

    /// The consumer has been closed and accepts no further records.
    #[error("consumer is closed")]
    Closed,

    /// A previous rotation could not open a new file. The consumer refuses
    /// writes until it is closed and replaced.
    #[error("consumer is degraded after a failed rotation: {0}")]
    Degraded(String),

    /// A single record does not fit into an empty memory-mapped file.
    #[error("record of {size} bytes exceeds mapped file capacity of {capacity} bytes")]
    RecordTooLarge {
        /// Encoded record size in bytes.
        size: u64,
        /// Configured capacity of one backing file.
        capacity: u64,
    },

    /// A finalized log file contains a line that is not a JSON object.
    #[error("corrupt record at line {line} of {path}: {reason}")]
    CorruptRecord {
        /// The file being read.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Decoder message.
        reason: String,
    },
}

/// Convenience type alias for log results.
pub type LogResult<T> = Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs");
        let message = LogError::Io(io_error).to_string();
        assert!(message.contains("read-only fs"));
    }

    #[test]
    fn test_error_display_record_too_large() {
        let error = LogError::RecordTooLarge {
            size: 5000,
            capacity: 4096,
        };
        let message = error.to_string();
        assert!(message.contains("5000"));
        assert!(message.contains("4096"));
    }

    #[test]
    fn test_error_display_corrupt_record() {
        let error = LogError::CorruptRecord {
            path: "logs/p_1_0".to_string(),
            line: 3,
            reason: "EOF while parsing".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "corrupt record at line 3 of logs/p_1_0: EOF while parsing"
        );
    }
}
