// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Log - Memory-mapped consumer
//
// Each backing file is created at its full capacity and mapped writable.
// Records are copied into the mapping at the write offset; the unwritten
// tail stays zero-filled, so after a crash the first NUL byte marks the end
// of the data. When the next record does not fit, the file is synced,
// truncated to the bytes actually written, finalized, and a fresh file is
// mapped. Whatever the OS has already written back survives a process
// crash even without an explicit flush.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use memmap2::MmapMut;
use tracing::{debug, error, info, warn};

use crate::config::MmapConsumerConfig;
use crate::consumer::{Consumer, ConsumerState};
use crate::error::{LogError, LogResult};
use crate::naming::{recover_in_progress, FileSlot, LogNamer};

// ---------------------------------------------------------------------------
// MmapRegion
// ---------------------------------------------------------------------------

/// A mapped backing file and its write cursor.
#[derive(Debug)]
pub struct MmapRegion {
    slot: FileSlot,
    file: File,
    mmap: MmapMut,
    capacity: usize,
    write_offset: usize,
    flushed_offset: usize,
}

impl MmapRegion {
    fn create(slot: FileSlot, capacity: usize) -> LogResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&slot.in_progress)?;
        file.set_len(capacity as u64)?;

        // SAFETY: the file was just created with `create_new`, so no other
        // handle in this process maps or writes it, and its length stays
        // fixed until the mapping is dropped in `finish`.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        debug!(
            path = %slot.in_progress.display(),
            sequence = slot.sequence,
            capacity,
            "Mapped log file"
        );
        Ok(Self {
            slot,
            file,
            mmap,
            capacity,
            write_offset: 0,
            flushed_offset: 0,
        })
    }

    fn remaining(&self) -> usize {
        self.capacity - self.write_offset
    }

    /// Copy `record` (plus a newline if `terminate`) at the write offset.
    /// The caller has checked that it fits.
    fn append(&mut self, record: &[u8], terminate: bool) {
        let end = self.write_offset + record.len();
        self.mmap[self.write_offset..end].copy_from_slice(record);
        self.write_offset = end;
        if terminate {
            self.mmap[self.write_offset] = b'\n';
            self.write_offset += 1;
        }
    }

    fn unflushed(&self) -> usize {
        self.write_offset - self.flushed_offset
    }

    /// Synchronously write back every byte appended since the last sync.
    fn sync(&mut self) -> LogResult<()> {
        let len = self.unflushed();
        if len == 0 {
            return Ok(());
        }
        self.mmap.flush_range(self.flushed_offset, len)?;
        debug!(bytes = len, offset = self.flushed_offset, "Synced mapped range");
        self.flushed_offset = self.write_offset;
        Ok(())
    }

    /// Sync, unmap, cut the file to its written length, and finalize it.
    /// A file that never received a record is removed instead.
    fn finish(mut self) -> LogResult<()> {
        self.sync()?;
        let Self {
            slot,
            file,
            mmap,
            write_offset,
            ..
        } = self;
        drop(mmap);

        if write_offset == 0 {
            drop(file);
            return slot.discard();
        }
        file.set_len(write_offset as u64)?;
        file.sync_all()?;
        drop(file);
        slot.finalize()
    }

    /// Path of the file while it is mapped.
    pub fn path(&self) -> &Path {
        &self.slot.in_progress
    }

    pub fn sequence(&self) -> u64 {
        self.slot.sequence
    }

    /// Bytes of record data in the mapping.
    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// MmapLogConsumer
// ---------------------------------------------------------------------------

/// Consumer that writes records into fixed-capacity memory-mapped files.
#[derive(Debug)]
pub struct MmapLogConsumer {
    config: MmapConsumerConfig,
    namer: LogNamer,
    capacity: usize,
    current: Option<MmapRegion>,
    state: ConsumerState,
}

impl MmapLogConsumer {
    /// Create the directory if needed, finalize files orphaned by a previous
    /// crash, and map the first backing file.
    pub fn open(config: MmapConsumerConfig) -> LogResult<Self> {
        config.validate()?;
        let capacity = usize::try_from(config.capacity())
            .map_err(|_| LogError::Config("file_size does not fit in memory".into()))?;
        fs::create_dir_all(&config.path)?;

        match recover_in_progress(&config.path, &config.name_prefix) {
            Ok(recovered) if !recovered.is_empty() => {
                info!(count = recovered.len(), "Recovered orphaned log files");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Skipping recovery of orphaned log files"),
        }

        let mut namer = LogNamer::new(&config.path, &config.name_prefix);
        let current = MmapRegion::create(namer.next_slot(), capacity)?;

        Ok(Self {
            config,
            namer,
            capacity,
            current: Some(current),
            state: ConsumerState::Open,
        })
    }

    /// The region currently receiving records, if any.
    pub fn current_region(&self) -> Option<&MmapRegion> {
        self.current.as_ref()
    }

    pub fn config(&self) -> &MmapConsumerConfig {
        &self.config
    }

    fn check_writable(&self) -> LogResult<()> {
        match &self.state {
            ConsumerState::Open => Ok(()),
            ConsumerState::Degraded(reason) => Err(LogError::Degraded(reason.clone())),
            ConsumerState::Closed => Err(LogError::Closed),
        }
    }

    fn rotate(&mut self) -> LogResult<()> {
        if let Some(old) = self.current.take() {
            if let Err(e) = old.finish() {
                return Err(self.degrade(e));
            }
        }
        match MmapRegion::create(self.namer.next_slot(), self.capacity) {
            Ok(region) => {
                debug!(sequence = region.sequence(), "Rotated mapped log file");
                self.current = Some(region);
                Ok(())
            }
            Err(e) => Err(self.degrade(e)),
        }
    }

    fn degrade(&mut self, cause: LogError) -> LogError {
        let reason = cause.to_string();
        error!(%reason, "Mapped log rotation failed; consumer rejects writes until closed");
        self.state = ConsumerState::Degraded(reason);
        cause
    }
}

impl Consumer for MmapLogConsumer {
    fn write(&mut self, record: &[u8]) -> LogResult<()> {
        self.check_writable()?;

        let terminate = !record.ends_with(b"\n");
        let size = record.len() + usize::from(terminate);
        if size > self.capacity {
            warn!(
                size,
                capacity = self.capacity,
                "Record does not fit into an empty mapped file"
            );
            return Err(LogError::RecordTooLarge {
                size: size as u64,
                capacity: self.capacity as u64,
            });
        }

        let needs_rotation = match &self.current {
            Some(region) => {
                region.write_offset > 0
                    && (size > region.remaining()
                        || region.slot.is_expired(self.config.rotate_interval()))
            }
            None => true,
        };
        if needs_rotation {
            self.rotate()?;
        }

        let threshold = self.config.flush_threshold();
        let Some(region) = self.current.as_mut() else {
            return Err(LogError::Degraded("no mapped log file".into()));
        };
        region.append(record, terminate);

        if threshold.is_some_and(|limit| region.unflushed() as u64 >= limit) {
            region.sync()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> LogResult<()> {
        self.check_writable()?;
        if let Some(region) = self.current.as_mut() {
            region.sync()?;
        }
        Ok(())
    }

    fn close(&mut self) -> LogResult<()> {
        if self.state == ConsumerState::Closed {
            return Ok(());
        }
        let result = match self.current.take() {
            Some(region) => region.finish(),
            None => Ok(()),
        };
        self.state = ConsumerState::Closed;
        debug!(next_sequence = self.namer.next_sequence(), "Closed mapped log consumer");
        result
    }

    fn kind(&self) -> &'static str {
        "mlog"
    }
}

impl Drop for MmapLogConsumer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "Failed to close mapped log consumer on drop");
        }
    }
}
