// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Log - Consumer abstraction
//
// A consumer persists already-encoded records. The two concrete variants
// are selected once, from the `consumer` tag of the configuration, and are
// otherwise independent of each other.

use tracing::info;

use crate::config::ConsumerConfig;
use crate::error::LogResult;
use crate::file_log::FileLogConsumer;
use crate::mmap_log::MmapLogConsumer;

/// A sink for encoded, newline-terminated records.
///
/// Implementations are driven by one thread at a time (the engine holds
/// them behind a mutex) but must be movable between threads.
pub trait Consumer: Send {
    /// Accept one record. The record may sit in memory until a batch
    /// threshold, flush, or close persists it. A record lacking the trailing
    /// newline gets one appended.
    fn write(&mut self, record: &[u8]) -> LogResult<()>;

    /// Block until every record accepted so far has reached the filesystem
    /// (for mapped files: dirty pages synced, not just resident).
    fn flush(&mut self) -> LogResult<()>;

    /// Flush, finalize the current file and release every handle and
    /// mapping. Calling `close` again is a no-op; `write` after `close`
    /// fails with [`crate::LogError::Closed`].
    fn close(&mut self) -> LogResult<()>;

    /// The `consumer` tag this implementation answers to.
    fn kind(&self) -> &'static str;
}

/// Lifecycle of a single consumer instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsumerState {
    Open,
    /// A rotation failed; the message is reported by every later write.
    Degraded(String),
    Closed,
}

// ---------------------------------------------------------------------------
// AnyConsumer
// ---------------------------------------------------------------------------

/// The closed set of consumer variants.
#[derive(Debug)]
pub enum AnyConsumer {
    File(FileLogConsumer),
    Mmap(MmapLogConsumer),
}

impl AnyConsumer {
    /// Validate `config` and construct the variant it names.
    pub fn open(config: &ConsumerConfig) -> LogResult<Self> {
        config.validate()?;
        let consumer = match config {
            ConsumerConfig::Log(log) => Self::File(FileLogConsumer::open(log.clone())?),
            ConsumerConfig::Mmap(mmap) => Self::Mmap(MmapLogConsumer::open(mmap.clone())?),
        };
        info!(
            consumer = config.kind(),
            path = %config.path().display(),
            "Opened consumer"
        );
        Ok(consumer)
    }
}

impl Consumer for AnyConsumer {
    fn write(&mut self, record: &[u8]) -> LogResult<()> {
        match self {
            Self::File(consumer) => consumer.write(record),
            Self::Mmap(consumer) => consumer.write(record),
        }
    }

    fn flush(&mut self) -> LogResult<()> {
        match self {
            Self::File(consumer) => consumer.flush(),
            Self::Mmap(consumer) => consumer.flush(),
        }
    }

    fn close(&mut self) -> LogResult<()> {
        match self {
            Self::File(consumer) => consumer.close(),
            Self::Mmap(consumer) => consumer.close(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::File(consumer) => consumer.kind(),
            Self::Mmap(consumer) => consumer.kind(),
        }
    }
}
