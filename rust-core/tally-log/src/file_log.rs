// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Log - Rotating flat-file consumer
//
// Records are collected in memory and appended to the current file one
// batch at a time, as soon as `max_batch_len` records are waiting. Before a
// batch is appended, the projected file size (current size plus batch size)
// is checked against `max_file_size_bytes`; if the batch would push a
// non-empty file over the cap, the file is finalized and a fresh one opened
// first. A batch that is larger than the cap on its own is written whole to
// the fresh file rather than split.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::config::LogConsumerConfig;
use crate::consumer::{Consumer, ConsumerState};
use crate::error::{LogError, LogResult};
use crate::naming::{recover_in_progress, FileSlot, LogNamer};

// ---------------------------------------------------------------------------
// LogFile
// ---------------------------------------------------------------------------

/// The file currently receiving batches.
#[derive(Debug)]
pub struct LogFile {
    slot: FileSlot,
    file: File,
    bytes_written: u64,
    records_written: u64,
}

impl LogFile {
    fn create(slot: FileSlot) -> LogResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&slot.in_progress)?;
        debug!(
            path = %slot.in_progress.display(),
            sequence = slot.sequence,
            "Opened log file"
        );
        Ok(Self {
            slot,
            file,
            bytes_written: 0,
            records_written: 0,
        })
    }

    fn append(&mut self, bytes: &[u8], records: u64) -> LogResult<()> {
        if let Err(e) = self.file.write_all(bytes) {
            // Cut a torn append back to the last complete batch so the file
            // only ever holds whole lines.
            if let Err(truncate_error) = self.file.set_len(self.bytes_written) {
                warn!(
                    path = %self.slot.in_progress.display(),
                    error = %truncate_error,
                    "Could not truncate log file after failed append"
                );
            }
            return Err(e.into());
        }
        self.bytes_written += bytes.len() as u64;
        self.records_written += records;
        Ok(())
    }

    fn sync(&self) -> LogResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Sync and finalize, or remove the file if nothing was ever written.
    fn finish(self) -> LogResult<()> {
        let Self {
            slot,
            file,
            bytes_written,
            ..
        } = self;
        if bytes_written == 0 {
            drop(file);
            return slot.discard();
        }
        file.sync_all()?;
        drop(file);
        slot.finalize()
    }

    /// Path of the file while it is being written.
    pub fn path(&self) -> &Path {
        &self.slot.in_progress
    }

    /// Path the file will have once finalized.
    pub fn final_path(&self) -> &Path {
        &self.slot.finalized
    }

    pub fn sequence(&self) -> u64 {
        self.slot.sequence
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

// ---------------------------------------------------------------------------
// FileLogConsumer
// ---------------------------------------------------------------------------

/// Append-only consumer writing newline-delimited JSON to rotating files.
#[derive(Debug)]
pub struct FileLogConsumer {
    config: LogConsumerConfig,
    namer: LogNamer,
    current: Option<LogFile>,
    batch: Vec<u8>,
    records_buffered: u64,
    state: ConsumerState,
}

impl FileLogConsumer {
    /// Create the directory if needed, finalize files orphaned by a previous
    /// crash, and open the first log file.
    pub fn open(config: LogConsumerConfig) -> LogResult<Self> {
        config.validate()?;
        fs::create_dir_all(&config.path)?;

        match recover_in_progress(&config.path, &config.name_prefix) {
            Ok(recovered) if !recovered.is_empty() => {
                info!(count = recovered.len(), "Recovered orphaned log files");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Skipping recovery of orphaned log files"),
        }

        let mut namer = LogNamer::new(&config.path, &config.name_prefix);
        let current = LogFile::create(namer.next_slot())?;

        Ok(Self {
            config,
            namer,
            current: Some(current),
            batch: Vec::new(),
            records_buffered: 0,
            state: ConsumerState::Open,
        })
    }

    /// The file currently receiving batches, if any.
    pub fn current_file(&self) -> Option<&LogFile> {
        self.current.as_ref()
    }

    /// Records accepted but not yet appended to a file.
    pub fn records_buffered(&self) -> u64 {
        self.records_buffered
    }

    pub fn config(&self) -> &LogConsumerConfig {
        &self.config
    }

    fn check_writable(&self) -> LogResult<()> {
        match &self.state {
            ConsumerState::Open => Ok(()),
            ConsumerState::Degraded(reason) => Err(LogError::Degraded(reason.clone())),
            ConsumerState::Closed => Err(LogError::Closed),
        }
    }

    /// Append the pending batch, rotating first if the projected size would
    /// exceed the cap or the file has aged out.
    fn append_batch(&mut self) -> LogResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let pending = self.batch.len() as u64;
        let max = self.config.max_file_size_bytes;
        let needs_rotation = match &self.current {
            Some(file) => {
                file.bytes_written > 0
                    && (file.bytes_written + pending > max
                        || file.slot.is_expired(self.config.rotate_interval()))
            }
            None => true,
        };

        if needs_rotation {
            if let Err(e) = self.rotate() {
                self.drop_batch(&e);
                return Err(e);
            }
        }

        if pending > max {
            warn!(
                bytes = pending,
                max_file_size_bytes = max,
                "Single batch exceeds the file size cap; writing it whole"
            );
        }

        let Some(file) = self.current.as_mut() else {
            let e = LogError::Degraded("no open log file".into());
            self.drop_batch(&e);
            return Err(e);
        };

        let records = self.records_buffered;
        let result = file.append(&self.batch, records);
        self.batch.clear();
        self.records_buffered = 0;

        match &result {
            Ok(()) => debug!(records, bytes = pending, "Appended batch"),
            Err(e) => error!(records, error = %e, "Dropped batch after failed append"),
        }
        result
    }

    fn rotate(&mut self) -> LogResult<()> {
        if let Some(old) = self.current.take() {
            if let Err(e) = old.finish() {
                return Err(self.degrade(e));
            }
        }
        match LogFile::create(self.namer.next_slot()) {
            Ok(file) => {
                debug!(sequence = file.sequence(), "Rotated log file");
                self.current = Some(file);
                Ok(())
            }
            Err(e) => Err(self.degrade(e)),
        }
    }

    fn degrade(&mut self, cause: LogError) -> LogError {
        let reason = cause.to_string();
        error!(%reason, "Log rotation failed; consumer rejects writes until closed");
        self.state = ConsumerState::Degraded(reason);
        cause
    }

    fn drop_batch(&mut self, cause: &LogError) {
        error!(
            records = self.records_buffered,
            error = %cause,
            "Dropped pending batch"
        );
        self.batch.clear();
        self.records_buffered = 0;
    }
}

impl Consumer for FileLogConsumer {
    fn write(&mut self, record: &[u8]) -> LogResult<()> {
        self.check_writable()?;

        self.batch.extend_from_slice(record);
        if !record.ends_with(b"\n") {
            self.batch.push(b'\n');
        }
        self.records_buffered += 1;

        if self.records_buffered >= self.config.max_batch_len {
            self.append_batch()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> LogResult<()> {
        self.check_writable()?;
        self.append_batch()?;
        if let Some(file) = &self.current {
            file.sync()?;
        }
        Ok(())
    }

    fn close(&mut self) -> LogResult<()> {
        if self.state == ConsumerState::Closed {
            return Ok(());
        }

        let batch_result = if self.state == ConsumerState::Open {
            self.append_batch()
        } else {
            Ok(())
        };
        let finish_result = match self.current.take() {
            Some(file) => file.finish(),
            None => Ok(()),
        };
        self.state = ConsumerState::Closed;
        debug!(next_sequence = self.namer.next_sequence(), "Closed log consumer");

        batch_result.and(finish_result)
    }

    fn kind(&self) -> &'static str {
        "log"
    }
}

impl Drop for FileLogConsumer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "Failed to close log consumer on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{list_log_files, read_records};
    use tempfile::TempDir;

    fn config(dir: &Path, max_batch_len: u64, max_file_size_bytes: u64) -> LogConsumerConfig {
        LogConsumerConfig {
            path: dir.to_path_buf(),
            name_prefix: "p_".to_string(),
            max_batch_len,
            max_file_size_bytes,
            rotate_interval_secs: None,
        }
    }

    fn record(name: &str) -> Vec<u8> {
        format!("{{\"#event_name\":\"{name}\"}}\n").into_bytes()
    }

    #[test]
    fn test_batch_appended_at_threshold() {
        let dir = TempDir::new().unwrap();
        let mut consumer = FileLogConsumer::open(config(dir.path(), 2, 1_000_000)).unwrap();

        consumer.write(&record("first")).unwrap();
        assert_eq!(consumer.records_buffered(), 1);
        assert_eq!(consumer.current_file().unwrap().records_written(), 0);

        consumer.write(&record("second")).unwrap();
        assert_eq!(consumer.records_buffered(), 0);
        let current = consumer.current_file().unwrap();
        assert_eq!(current.records_written(), 2);
        assert_eq!(current.sequence(), 0);
        assert_eq!(read_records(current.path()).unwrap().len(), 2);

        consumer.write(&record("third")).unwrap();
        assert_eq!(consumer.records_buffered(), 1);
        assert_eq!(consumer.current_file().unwrap().records_written(), 2);

        consumer.flush().unwrap();
        assert_eq!(consumer.current_file().unwrap().records_written(), 3);
    }

    #[test]
    fn test_in_progress_file_hidden_until_close() {
        let dir = TempDir::new().unwrap();
        let mut consumer = FileLogConsumer::open(config(dir.path(), 1, 1_000_000)).unwrap();
        consumer.write(&record("a")).unwrap();

        assert!(list_log_files(dir.path(), "p_").unwrap().is_empty());
        let in_progress = consumer.current_file().unwrap().path().to_path_buf();
        assert!(in_progress.to_string_lossy().ends_with(".tmp"));

        consumer.close().unwrap();
        let files = list_log_files(dir.path(), "p_").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].sequence, 0);
        assert!(!in_progress.exists());
    }

    #[test]
    fn test_rotation_on_projected_size() {
        let dir = TempDir::new().unwrap();
        let line = record("abcdefgh");
        let cap = (line.len() * 3) as u64;
        let mut consumer = FileLogConsumer::open(config(dir.path(), 1, cap)).unwrap();

        for _ in 0..7 {
            consumer.write(&line).unwrap();
        }
        consumer.close().unwrap();

        let files = list_log_files(dir.path(), "p_").unwrap();
        let sequences: Vec<u64> = files.iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        for file in &files {
            assert!(file.size <= cap);
        }
        let total: usize = files
            .iter()
            .map(|f| read_records(&f.path).unwrap().len())
            .sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn test_oversized_batch_written_whole() {
        let dir = TempDir::new().unwrap();
        let line = record("oversized");
        let mut consumer =
            FileLogConsumer::open(config(dir.path(), 4, line.len() as u64)).unwrap();

        consumer.write(&line).unwrap();
        consumer.flush().unwrap();
        for _ in 0..4 {
            consumer.write(&line).unwrap();
        }
        consumer.close().unwrap();

        let files = list_log_files(dir.path(), "p_").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].size, line.len() as u64);
        assert_eq!(files[1].size, (line.len() * 4) as u64);
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_writes() {
        let dir = TempDir::new().unwrap();
        let mut consumer = FileLogConsumer::open(config(dir.path(), 10, 1_000_000)).unwrap();
        consumer.write(&record("kept")).unwrap();

        consumer.close().unwrap();
        consumer.close().unwrap();
        assert!(matches!(consumer.write(&record("late")), Err(LogError::Closed)));
        assert!(matches!(consumer.flush(), Err(LogError::Closed)));

        let files = list_log_files(dir.path(), "p_").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(read_records(&files[0].path).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_file_removed_on_close() {
        let dir = TempDir::new().unwrap();
        let mut consumer = FileLogConsumer::open(config(dir.path(), 10, 1_000_000)).unwrap();
        consumer.close().unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_record_without_newline_gets_one() {
        let dir = TempDir::new().unwrap();
        let mut consumer = FileLogConsumer::open(config(dir.path(), 1, 1_000_000)).unwrap();
        consumer.write(b"{\"a\":1}").unwrap();
        consumer.write(b"{\"a\":2}").unwrap();
        let data = fs::read(consumer.current_file().unwrap().path()).unwrap();
        assert_eq!(data, b"{\"a\":1}\n{\"a\":2}\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_rotation_degrades_consumer() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let line = record("x");
        let mut consumer =
            FileLogConsumer::open(config(dir.path(), 1, line.len() as u64)).unwrap();
        consumer.write(&line).unwrap();

        // Read-only directory: the next rotation cannot create its file.
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();
        let canary = dir.path().join("canary");
        let writable = fs::write(&canary, b"").is_ok();
        if writable {
            // Running with privileges that ignore directory permissions.
            let _ = fs::remove_file(&canary);
            fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        assert!(consumer.write(&line).is_err());
        assert!(matches!(consumer.write(&line), Err(LogError::Degraded(_))));

        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
        consumer.close().unwrap();
        assert!(matches!(consumer.write(&line), Err(LogError::Closed)));
    }
}
