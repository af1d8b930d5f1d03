// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Log consumers
//
// Persists encoded event records to a local directory so that a separate
// uploader can ship them later. Two interchangeable consumers exist, picked
// by the `consumer` tag of the configuration:
//
// - `log`: records are batched in memory and appended to rotating flat
//   files, each capped at a projected size.
// - `mlog`: records are copied into fixed-capacity memory-mapped files that
//   survive a process crash without an explicit flush.
//
// # On-disk layout
//
// Every file holds newline-delimited JSON objects, one record per line.
//
// ```text
// <path>/
//   tally_1718000000000_0        finalized, safe to upload
//   tally_1718000004211_1        finalized
//   tally_1718000009876_2.tmp    currently being written
// ```
//
// A file is renamed to its final name only when it is rotated out or the
// consumer is closed. In-progress files found when a consumer opens belong
// to an instance that crashed; they are cut back to their last complete
// line and finalized.
//
// ## Usage
//
// ```no_run
// use tally_log::{AnyConsumer, Consumer, ConsumerConfig, LogConsumerConfig};
//
// let mut config = LogConsumerConfig::new("/tmp/tally-logs");
// config.max_batch_len = 50;
//
// let mut consumer = AnyConsumer::open(&ConsumerConfig::Log(config)).unwrap();
// consumer.write(b"{\"#event_name\":\"launch\"}\n").unwrap();
// consumer.flush().unwrap();
// consumer.close().unwrap();
// ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod file_log;
pub mod metrics;
pub mod mmap_log;
pub mod naming;
pub mod reader;

// Re-export the primary public API for ergonomic imports.
pub use config::{
    ConsumerConfig, LogConsumerConfig, MmapConsumerConfig, DEFAULT_MAX_BATCH_LEN,
    DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_MMAP_FILE_SIZE, DEFAULT_NAME_PREFIX,
};
pub use consumer::{AnyConsumer, Consumer};
pub use error::{LogError, LogResult};
pub use file_log::{FileLogConsumer, LogFile};
pub use metrics::{ConsumerStats, MeteredConsumer};
pub use mmap_log::{MmapLogConsumer, MmapRegion};
pub use naming::{recover_in_progress, LogNamer};
pub use reader::{list_in_progress, list_log_files, read_records, LogFileInfo};
