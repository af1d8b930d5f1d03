// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Log - Metrics-collecting consumer wrapper
//
// Wraps any `Consumer` and counts accepted records, bytes, failed writes and
// flushes, along with the wall-clock time spent flushing. The engine exposes
// a snapshot to bindings that want to report SDK health.

use std::time::Instant;

use crate::consumer::Consumer;
use crate::error::LogResult;

/// Accumulated statistics for a consumer.
///
/// All counters are monotonically increasing for the lifetime of the
/// [`MeteredConsumer`] that owns them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerStats {
    /// Records the consumer accepted.
    pub records_accepted: u64,
    /// Bytes of accepted records, as handed to the consumer.
    pub bytes_accepted: u64,
    /// `write` calls that returned an error.
    pub write_errors: u64,
    /// Successful `flush` calls.
    pub flush_count: u64,
    /// Cumulative wall-clock latency of all `flush` calls, in milliseconds.
    pub flush_latency_sum_ms: f64,
}

/// A consumer wrapper that collects write and flush metrics.
///
/// # Example
///
/// ```rust
/// use tally_log::{Consumer, FileLogConsumer, LogConsumerConfig, MeteredConsumer};
///
/// let dir = tempfile::TempDir::new().unwrap();
/// let inner = FileLogConsumer::open(LogConsumerConfig::new(dir.path())).unwrap();
/// let mut metered = MeteredConsumer::new(inner);
///
/// metered.write(b"{\"#event_name\":\"open\"}\n").unwrap();
/// metered.flush().unwrap();
///
/// assert_eq!(metered.stats().records_accepted, 1);
/// assert_eq!(metered.stats().flush_count, 1);
/// ```
#[derive(Debug)]
pub struct MeteredConsumer<C: Consumer> {
    inner: C,
    stats: ConsumerStats,
}

impl<C: Consumer> MeteredConsumer<C> {
    /// Wrap `inner` with metrics collection.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            stats: ConsumerStats::default(),
        }
    }

    /// The current statistics.
    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    /// Reset all statistics to zero.
    pub fn reset_stats(&mut self) {
        self.stats = ConsumerStats::default();
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Consumer> Consumer for MeteredConsumer<C> {
    fn write(&mut self, record: &[u8]) -> LogResult<()> {
        let result = self.inner.write(record);
        match result {
            Ok(()) => {
                self.stats.records_accepted += 1;
                self.stats.bytes_accepted += record.len() as u64;
            }
            Err(_) => self.stats.write_errors += 1,
        }
        result
    }

    fn flush(&mut self) -> LogResult<()> {
        let start = Instant::now();
        let result = self.inner.flush();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        if result.is_ok() {
            self.stats.flush_count += 1;
            self.stats.flush_latency_sum_ms += elapsed_ms;
        }
        result
    }

    fn close(&mut self) -> LogResult<()> {
        self.inner.close()
    }

    fn kind(&self) -> &'static str {
        self.inner.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogError;

    /// Consumer that fails every write after the first `limit`.
    #[derive(Debug, Default)]
    struct Recording {
        limit: usize,
        lines: Vec<Vec<u8>>,
        closed: bool,
    }

    impl Consumer for Recording {
        fn write(&mut self, record: &[u8]) -> LogResult<()> {
            if self.closed {
                return Err(LogError::Closed);
            }
            if self.lines.len() >= self.limit {
                return Err(LogError::Degraded("full".into()));
            }
            self.lines.push(record.to_vec());
            Ok(())
        }

        fn flush(&mut self) -> LogResult<()> {
            Ok(())
        }

        fn close(&mut self) -> LogResult<()> {
            self.closed = true;
            Ok(())
        }

        fn kind(&self) -> &'static str {
            "recording"
        }
    }

    #[test]
    fn test_counts_accepted_and_failed_writes() {
        let mut metered = MeteredConsumer::new(Recording {
            limit: 2,
            ..Default::default()
        });

        metered.write(b"abc\n").unwrap();
        metered.write(b"de\n").unwrap();
        assert!(metered.write(b"f\n").is_err());

        let stats = metered.stats();
        assert_eq!(stats.records_accepted, 2);
        assert_eq!(stats.bytes_accepted, 7);
        assert_eq!(stats.write_errors, 1);
        assert_eq!(metered.inner().lines.len(), 2);
    }

    #[test]
    fn test_counts_flushes_and_resets() {
        let mut metered = MeteredConsumer::new(Recording::default());
        metered.flush().unwrap();
        metered.flush().unwrap();
        assert_eq!(metered.stats().flush_count, 2);
        assert!(metered.stats().flush_latency_sum_ms >= 0.0);

        metered.reset_stats();
        assert_eq!(metered.stats(), &ConsumerStats::default());
    }

    #[test]
    fn test_delegates_close_and_kind() {
        let mut metered = MeteredConsumer::new(Recording::default());
        assert_eq!(metered.kind(), "recording");
        metered.close().unwrap();
        assert!(metered.into_inner().closed);
    }
}
